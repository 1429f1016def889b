use crate::clock::ClockOffset;
use crate::dispatcher::{self, CommandResponse};
use crate::error::CommandError;
use crate::http_client::HttpTransport;
use crate::service::{Command, ServiceDescriptor, ServiceEndpoint};
use crate::soap::{self, SecurityStamp};

/// Shared core of every service facade: one endpoint, its clock offset and
/// the transport used to reach it.
pub struct ServiceClient<T> {
    descriptor: &'static ServiceDescriptor,
    endpoint: ServiceEndpoint,
    clock_offset: ClockOffset,
    transport: T,
}

impl<T: HttpTransport> ServiceClient<T> {
    pub fn new(
        descriptor: &'static ServiceDescriptor,
        endpoint: ServiceEndpoint,
        clock_offset: ClockOffset,
        transport: T,
    ) -> Self {
        Self {
            descriptor,
            endpoint,
            clock_offset,
            transport,
        }
    }

    pub fn clock_offset(&self) -> ClockOffset {
        self.clock_offset
    }

    /// Replaces the offset after a new time synchronization. Requests that
    /// are already assembled keep the timestamp they were built with.
    pub fn set_clock_offset(&mut self, offset: ClockOffset) {
        tracing::debug!(
            service = self.descriptor.name,
            offset_ms = offset.as_duration().whole_milliseconds() as i64,
            "clock offset updated"
        );
        self.clock_offset = offset;
    }

    pub async fn call<C: Command>(&self, command: &C) -> Result<CommandResponse, CommandError> {
        let stamp = SecurityStamp::now(self.clock_offset);
        self.call_with_stamp(command, &stamp).await
    }

    pub(crate) async fn call_with_stamp<C: Command>(
        &self,
        command: &C,
        stamp: &SecurityStamp,
    ) -> Result<CommandResponse, CommandError> {
        let body = command.build_body().map_err(|err| {
            tracing::debug!(operation = C::OPERATION, "rejected parameters: {err}");
            err
        })?;
        let envelope = soap::assemble(self.descriptor, &self.endpoint, C::OPERATION, body, stamp)?;
        dispatcher::dispatch(&self.transport, envelope).await
    }
}
