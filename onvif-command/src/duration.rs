/// Renders a whole number of seconds as an `xs:duration`, e.g. `PT60S`.
pub fn xs_duration(seconds: u64) -> String {
    format!("PT{}S", seconds)
}
