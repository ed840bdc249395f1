use std::time::Duration;

use reqwest::{Client, Error};

pub struct HttpClient;

impl HttpClient {
    pub const USER_AGENT: &'static str = "Mozilla/5.0 (compatible; Blindlink/0.1.0)";

    pub fn new() -> Result<Client, Error> {
        Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
    }
}
