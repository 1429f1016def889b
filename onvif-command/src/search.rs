use crate::client::ServiceClient;
use crate::clock::ClockOffset;
use crate::dispatcher::CommandResponse;
use crate::duration::xs_duration;
use crate::error::{CommandError, TransportError, ValidationError};
use crate::http_client::{HttpTransport, ReqwestTransport};
use crate::service::{require_token, Command, ServiceEndpoint, SEARCH_SERVICE};
use crate::xml_tree::{leaf, raw_fragment, ElementExt};
use serde::Deserialize;
use xmltree::Element;

const RECEIVER_SOURCE_TYPE: &str = "http://www.onvif.org/ver10/schema/Receiver";

/// A source whose recordings are included in a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceReference {
    pub token: String,
    #[serde(rename = "Type")]
    pub source_type: Option<String>,
}

impl SourceReference {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            source_type: None,
        }
    }

    fn to_element(&self) -> Element {
        Element::new("tt:IncludedSources")
            .with_attr("Type", RECEIVER_SOURCE_TYPE)
            .with_child(leaf("tt:Token", self.token.as_str()))
            .with_opt(non_empty(&self.source_type).map(|kind| leaf("tt:Type", kind)))
    }
}

/// Dataset a search runs over. `extension` is inserted as raw markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchScope {
    #[serde(default)]
    pub included_sources: Vec<SourceReference>,
    #[serde(default)]
    pub included_recordings: Vec<String>,
    pub recording_information_filter: Option<String>,
    pub extension: Option<String>,
}

impl SearchScope {
    fn to_element(&self) -> Result<Element, ValidationError> {
        for (index, source) in self.included_sources.iter().enumerate() {
            require_token(
                &format!("Scope.IncludedSources[{}].Token", index),
                &source.token,
            )?;
        }
        for (index, recording) in self.included_recordings.iter().enumerate() {
            require_token(&format!("Scope.IncludedRecordings[{}]", index), recording)?;
        }
        let extension = match non_empty(&self.extension) {
            Some(raw) => Some(
                Element::new("tt:Extension").with_nodes(raw_fragment("Scope.Extension", raw)?),
            ),
            None => None,
        };
        Ok(Element::new("tse:Scope")
            .with_children(self.included_sources.iter().map(SourceReference::to_element))
            .with_children(
                self.included_recordings
                    .iter()
                    .map(|token| leaf("tt:IncludedRecordings", token.as_str())),
            )
            .with_opt(
                non_empty(&self.recording_information_filter)
                    .map(|filter| leaf("tt:RecordingInformationFilter", filter)),
            )
            .with_opt(extension))
    }
}

/// `KeepAliveTime` is in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FindRecordingsParams {
    pub scope: SearchScope,
    pub max_matches: Option<u32>,
    pub keep_alive_time: u64,
}

impl Command for FindRecordingsParams {
    const OPERATION: &'static str = "FindRecordings";

    fn build_body(&self) -> Result<Element, ValidationError> {
        Ok(Element::new("tse:FindRecordings")
            .with_child(self.scope.to_element()?)
            .with_opt(
                self.max_matches
                    .map(|max| leaf("tse:MaxMatches", max.to_string())),
            )
            .with_child(leaf("tse:KeepAliveTime", xs_duration(self.keep_alive_time))))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetRecordingSummary;

impl Command for GetRecordingSummary {
    const OPERATION: &'static str = "GetRecordingSummary";

    fn build_body(&self) -> Result<Element, ValidationError> {
        Ok(Element::new("tse:GetRecordingSummary"))
    }
}

/// `WaitTime` is in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRecordingSearchResultsParams {
    pub search_token: String,
    pub min_results: Option<u32>,
    pub max_results: Option<u32>,
    pub wait_time: Option<u64>,
}

impl Command for GetRecordingSearchResultsParams {
    const OPERATION: &'static str = "GetRecordingSearchResults";

    fn build_body(&self) -> Result<Element, ValidationError> {
        require_token("SearchToken", &self.search_token)?;
        if let (Some(min), Some(max)) = (self.min_results, self.max_results) {
            if min > max {
                return Err(ValidationError::invalid(
                    "MinResults",
                    format!("{} is greater than MaxResults {}", min, max),
                ));
            }
        }
        Ok(Element::new("tse:GetRecordingSearchResults")
            .with_child(leaf("tse:SearchToken", self.search_token.as_str()))
            .with_opt(self.min_results.map(|min| leaf("tse:MinResults", min.to_string())))
            .with_opt(self.max_results.map(|max| leaf("tse:MaxResults", max.to_string())))
            .with_opt(self.wait_time.map(|wait| leaf("tse:WaitTime", xs_duration(wait)))))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndSearchParams {
    pub search_token: String,
}

impl Command for EndSearchParams {
    const OPERATION: &'static str = "EndSearch";

    fn build_body(&self) -> Result<Element, ValidationError> {
        require_token("SearchToken", &self.search_token)?;
        Ok(Element::new("tse:EndSearch")
            .with_child(leaf("tse:SearchToken", self.search_token.as_str())))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetServiceCapabilities;

impl Command for GetServiceCapabilities {
    const OPERATION: &'static str = "GetServiceCapabilities";

    fn build_body(&self) -> Result<Element, ValidationError> {
        Ok(Element::new("tse:GetServiceCapabilities"))
    }
}

pub struct SearchService<T = ReqwestTransport> {
    client: ServiceClient<T>,
}

impl<T: HttpTransport> SearchService<T> {
    pub fn new(endpoint: ServiceEndpoint, clock_offset: ClockOffset, transport: T) -> Self {
        Self {
            client: ServiceClient::new(&SEARCH_SERVICE, endpoint, clock_offset, transport),
        }
    }

    pub fn set_clock_offset(&mut self, offset: ClockOffset) {
        self.client.set_clock_offset(offset);
    }

    /// Starts a search session; the reply carries the `SearchToken` used by
    /// [`Self::get_recording_search_results`] and [`Self::end_search`].
    pub async fn find_recordings(
        &self,
        params: &FindRecordingsParams,
    ) -> Result<CommandResponse, CommandError> {
        self.client.call(params).await
    }

    pub async fn get_recording_summary(&self) -> Result<CommandResponse, CommandError> {
        self.client.call(&GetRecordingSummary).await
    }

    pub async fn get_recording_search_results(
        &self,
        params: &GetRecordingSearchResultsParams,
    ) -> Result<CommandResponse, CommandError> {
        self.client.call(params).await
    }

    pub async fn end_search(
        &self,
        params: &EndSearchParams,
    ) -> Result<CommandResponse, CommandError> {
        self.client.call(params).await
    }

    pub async fn get_service_capabilities(&self) -> Result<CommandResponse, CommandError> {
        self.client.call(&GetServiceCapabilities).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindRecordingsResult {
    pub search_token: String,
}

impl FindRecordingsResult {
    pub fn from_response(response: &CommandResponse) -> Result<Self, TransportError> {
        let search_token = response
            .data()
            .child_text("SearchToken")
            .ok_or_else(|| missing(response, "SearchToken"))?;
        Ok(Self { search_token })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub data_from: String,
    pub data_until: String,
    pub number_recordings: u32,
}

impl RecordingSummary {
    pub fn from_response(response: &CommandResponse) -> Result<Self, TransportError> {
        let summary = response
            .data()
            .find("Summary")
            .ok_or_else(|| missing(response, "Summary"))?;
        let number_recordings = summary
            .child_text("NumberRecordings")
            .ok_or_else(|| missing(response, "Summary/NumberRecordings"))?;
        let number_recordings = number_recordings.parse().map_err(|_| {
            TransportError::MalformedReply(format!(
                "NumberRecordings is not a number: {}",
                number_recordings
            ))
        })?;
        Ok(Self {
            data_from: summary
                .child_text("DataFrom")
                .ok_or_else(|| missing(response, "Summary/DataFrom"))?,
            data_until: summary
                .child_text("DataUntil")
                .ok_or_else(|| missing(response, "Summary/DataUntil"))?,
            number_recordings,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingInformation {
    pub recording_token: String,
    pub source_name: Option<String>,
    pub earliest_recording: Option<String>,
    pub latest_recording: Option<String>,
    pub recording_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSearchResults {
    pub search_state: String,
    pub recordings: Vec<RecordingInformation>,
}

impl RecordingSearchResults {
    pub fn from_response(response: &CommandResponse) -> Result<Self, TransportError> {
        let list = response
            .data()
            .find("ResultList")
            .ok_or_else(|| missing(response, "ResultList"))?;
        let search_state = list
            .child_text("SearchState")
            .ok_or_else(|| missing(response, "ResultList/SearchState"))?;
        let recordings = list
            .find_all("RecordingInformation")
            .map(|info| {
                Ok(RecordingInformation {
                    recording_token: info
                        .child_text("RecordingToken")
                        .ok_or_else(|| missing(response, "RecordingInformation/RecordingToken"))?,
                    source_name: info.find("Source").and_then(|source| source.child_text("Name")),
                    earliest_recording: info.child_text("EarliestRecording"),
                    latest_recording: info.child_text("LatestRecording"),
                    recording_status: info.child_text("RecordingStatus"),
                })
            })
            .collect::<Result<Vec<_>, TransportError>>()?;
        Ok(Self {
            search_state,
            recordings,
        })
    }

    /// The device has no more results for this search session.
    pub fn is_completed(&self) -> bool {
        self.search_state == "Completed"
    }
}

fn missing(response: &CommandResponse, path: &str) -> TransportError {
    TransportError::MalformedReply(format!(
        "{} reply has no {}",
        response.operation(),
        path
    ))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    mod success {
        use crate::search::{
            EndSearchParams, FindRecordingsParams, GetRecordingSearchResultsParams,
            GetRecordingSummary, SearchScope, SourceReference,
        };
        use crate::service::Command;
        use crate::xml_tree::ElementExt;

        fn body(command: &impl Command) -> String {
            command.build_body().unwrap().to_xml().unwrap()
        }

        #[test]
        fn find_recordings_minimal_scope() {
            let params = FindRecordingsParams {
                scope: SearchScope {
                    included_sources: vec![SourceReference::new("src1")],
                    ..Default::default()
                },
                max_matches: None,
                keep_alive_time: 60,
            };
            let body = body(&params);
            assert_eq!(
                body,
                concat!(
                    "<tse:FindRecordings><tse:Scope>",
                    r#"<tt:IncludedSources Type="http://www.onvif.org/ver10/schema/Receiver">"#,
                    "<tt:Token>src1</tt:Token></tt:IncludedSources>",
                    "</tse:Scope><tse:KeepAliveTime>PT60S</tse:KeepAliveTime></tse:FindRecordings>"
                )
            );
            assert_eq!(body.matches("<tt:IncludedSources").count(), 1);
            assert!(!body.contains("<tt:Type>"));
            assert!(!body.contains("MaxMatches"));
        }

        #[test]
        fn find_recordings_from_json_parameter_tree() {
            let params: FindRecordingsParams = serde_json::from_str(
                r#"{"Scope":{"IncludedSources":[{"Token":"src1"}]},"KeepAliveTime":60}"#,
            )
            .unwrap();
            assert_eq!(params.scope.included_sources, vec![SourceReference::new("src1")]);
            assert!(body(&params).contains("PT60S"));
        }

        #[test]
        fn find_recordings_full_tree_in_declared_order() {
            let params = FindRecordingsParams {
                scope: SearchScope {
                    included_sources: vec![
                        SourceReference {
                            token: "src1".to_string(),
                            source_type: Some("Camera".to_string()),
                        },
                        SourceReference::new("src2"),
                    ],
                    included_recordings: vec!["rec1".to_string(), "rec2".to_string()],
                    recording_information_filter: Some("boolean(//Track[TrackType = Video])".to_string()),
                    extension: Some("<x:Any xmlns:x=\"urn:x\"/>".to_string()),
                },
                max_matches: Some(10),
                keep_alive_time: 5,
            };
            let body = body(&params);
            let order = [
                "<tse:Scope>",
                "<tt:Token>src1</tt:Token><tt:Type>Camera</tt:Type>",
                "<tt:Token>src2</tt:Token></tt:IncludedSources>",
                "<tt:IncludedRecordings>rec1</tt:IncludedRecordings>",
                "<tt:IncludedRecordings>rec2</tt:IncludedRecordings>",
                "<tt:RecordingInformationFilter>boolean(//Track[TrackType = Video])</tt:RecordingInformationFilter>",
                "<tt:Extension><x:Any xmlns:x=\"urn:x\"/></tt:Extension>",
                "</tse:Scope>",
                "<tse:MaxMatches>10</tse:MaxMatches>",
                "<tse:KeepAliveTime>PT5S</tse:KeepAliveTime>",
            ];
            let mut cursor = 0;
            for fragment in order {
                let position = body[cursor..]
                    .find(fragment)
                    .unwrap_or_else(|| panic!("{} missing or out of order in {}", fragment, body));
                cursor += position + fragment.len();
            }
            for element in [
                "<tt:RecordingInformationFilter>",
                "<tt:Extension>",
                "<tse:MaxMatches>",
                "<tse:KeepAliveTime>",
                "<tse:Scope>",
            ] {
                assert_eq!(body.matches(element).count(), 1, "{}", element);
            }
            assert_eq!(body.matches("<tt:IncludedSources ").count(), 2);
            assert_eq!(body.matches("<tt:Type>").count(), 1);
        }

        #[test]
        fn empty_scope_still_renders_container() {
            let params = FindRecordingsParams {
                keep_alive_time: 0,
                ..Default::default()
            };
            assert_eq!(
                body(&params),
                "<tse:FindRecordings><tse:Scope/><tse:KeepAliveTime>PT0S</tse:KeepAliveTime></tse:FindRecordings>"
            );
        }

        #[test]
        fn empty_optional_strings_are_omitted() {
            let params = FindRecordingsParams {
                scope: SearchScope {
                    included_sources: vec![SourceReference {
                        token: "src1".to_string(),
                        source_type: Some(String::new()),
                    }],
                    recording_information_filter: Some(String::new()),
                    extension: Some(String::new()),
                    ..Default::default()
                },
                max_matches: None,
                keep_alive_time: 10,
            };
            let body = body(&params);
            assert!(!body.contains("<tt:Type"));
            assert!(!body.contains("RecordingInformationFilter"));
            assert!(!body.contains("Extension"));
        }

        #[test]
        fn whitespace_only_optional_strings_are_omitted() {
            let params = FindRecordingsParams {
                scope: SearchScope {
                    included_sources: vec![SourceReference {
                        token: "src1".to_string(),
                        source_type: Some("  ".to_string()),
                    }],
                    recording_information_filter: Some(" \t".to_string()),
                    extension: Some("\n  ".to_string()),
                    ..Default::default()
                },
                max_matches: None,
                keep_alive_time: 10,
            };
            let body = body(&params);
            assert!(!body.contains("<tt:Type"));
            assert!(!body.contains("RecordingInformationFilter"));
            assert!(!body.contains("Extension"));
        }

        #[test]
        fn recording_summary_is_empty_element() {
            assert_eq!(body(&GetRecordingSummary), "<tse:GetRecordingSummary/>");
        }

        #[test]
        fn search_results_with_optional_fields() {
            let params = GetRecordingSearchResultsParams {
                search_token: "tok-1".to_string(),
                min_results: Some(1),
                max_results: Some(50),
                wait_time: Some(5),
            };
            assert_eq!(
                body(&params),
                concat!(
                    "<tse:GetRecordingSearchResults>",
                    "<tse:SearchToken>tok-1</tse:SearchToken>",
                    "<tse:MinResults>1</tse:MinResults>",
                    "<tse:MaxResults>50</tse:MaxResults>",
                    "<tse:WaitTime>PT5S</tse:WaitTime>",
                    "</tse:GetRecordingSearchResults>"
                )
            );
        }

        #[test]
        fn search_results_omit_absent_fields() {
            let params = GetRecordingSearchResultsParams {
                search_token: "tok-1".to_string(),
                ..Default::default()
            };
            assert_eq!(
                body(&params),
                "<tse:GetRecordingSearchResults><tse:SearchToken>tok-1</tse:SearchToken></tse:GetRecordingSearchResults>"
            );
        }

        #[test]
        fn end_search_carries_token() {
            let params = EndSearchParams {
                search_token: "tok-1".to_string(),
            };
            assert_eq!(
                body(&params),
                "<tse:EndSearch><tse:SearchToken>tok-1</tse:SearchToken></tse:EndSearch>"
            );
        }
    }

    mod failure {
        use crate::error::ValidationError;
        use crate::search::{
            EndSearchParams, FindRecordingsParams, GetRecordingSearchResultsParams, SearchScope,
            SourceReference,
        };
        use crate::service::Command;

        #[test]
        fn keep_alive_time_is_required_in_json() {
            let err = serde_json::from_str::<FindRecordingsParams>(
                r#"{"Scope":{"IncludedSources":[{"Token":"src1"}]}}"#,
            )
            .map_err(ValidationError::from)
            .unwrap_err();
            assert_eq!(err, ValidationError::MissingField("KeepAliveTime".to_string()));
        }

        #[test]
        fn scope_is_required_in_json() {
            let err = serde_json::from_str::<FindRecordingsParams>(r#"{"KeepAliveTime":60}"#)
                .map_err(ValidationError::from)
                .unwrap_err();
            assert_eq!(err, ValidationError::MissingField("Scope".to_string()));
        }

        #[test]
        fn source_token_is_required() {
            let params = FindRecordingsParams {
                scope: SearchScope {
                    included_sources: vec![SourceReference::new("src1"), SourceReference::new("")],
                    ..Default::default()
                },
                max_matches: None,
                keep_alive_time: 60,
            };
            assert_eq!(
                params.build_body().unwrap_err(),
                ValidationError::MissingField("Scope.IncludedSources[1].Token".to_string())
            );
        }

        #[test]
        fn source_token_is_required_in_json() {
            let err = serde_json::from_str::<FindRecordingsParams>(
                r#"{"Scope":{"IncludedSources":[{"Type":"Camera"}]},"KeepAliveTime":60}"#,
            )
            .map_err(ValidationError::from)
            .unwrap_err();
            assert_eq!(err, ValidationError::MissingField("Token".to_string()));
        }

        #[test]
        fn search_token_is_required() {
            let params = GetRecordingSearchResultsParams::default();
            assert_eq!(
                params.build_body().unwrap_err(),
                ValidationError::MissingField("SearchToken".to_string())
            );
            assert_eq!(
                EndSearchParams::default().build_body().unwrap_err(),
                ValidationError::MissingField("SearchToken".to_string())
            );
        }

        #[test]
        fn min_results_above_max_results_is_rejected() {
            let params = GetRecordingSearchResultsParams {
                search_token: "tok-1".to_string(),
                min_results: Some(10),
                max_results: Some(2),
                wait_time: None,
            };
            assert!(matches!(
                params.build_body(),
                Err(ValidationError::InvalidValue { field, .. }) if field == "MinResults"
            ));
        }

        #[test]
        fn malformed_extension_is_rejected() {
            let params = FindRecordingsParams {
                scope: SearchScope {
                    extension: Some("<x:Open>".to_string()),
                    ..Default::default()
                },
                max_matches: None,
                keep_alive_time: 60,
            };
            assert!(matches!(
                params.build_body(),
                Err(ValidationError::InvalidValue { field, .. }) if field == "Scope.Extension"
            ));
        }
    }
}
