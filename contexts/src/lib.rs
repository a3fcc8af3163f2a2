/// <https://www.w3.org/2018/credentials/v1>
pub const CREDENTIALS_V1: &str = include_str!("../w3c-2018-credentials-v1.jsonld");
/// <https://www.w3.org/2018/credentials/examples/v1>
pub const CREDENTIALS_EXAMPLES_V1: &str =
    include_str!("../w3c-2018-credentials-examples-v1.jsonld");
/// <https://www.w3.org/ns/odrl.jsonld>
pub const ODRL: &str = include_str!("../w3c-odrl.jsonld");
