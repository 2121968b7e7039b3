fn user_agent() -> String {
    format!("cx-server/{}", env!("CARGO_PKG_VERSION"))
}

/// Base client builder shared by the contract fetch and connector calls.
pub fn builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder().user_agent(user_agent())
}

pub fn client() -> Result<reqwest::Client, reqwest::Error> {
    builder().build()
}
