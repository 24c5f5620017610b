//! This client fetches the directory, street and schedule pages and hands them to the parsers.

use anyhow::Result;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;

use crate::{
    config::ClientConfig,
    directory::{self, MunicipalityRecord, StreetQueryResult},
    schedule::{self, RawCollectionEntry},
};

static MUNICIPALITY_PARAM: &str = "gmina_id";
static STREET_PARAM: &str = "ulica";

/// Street names are sent with spaces as `%20`, everything but `-._~/` and alphanumerics escaped.
const STREET_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Something the refresher can pull raw collection entries from.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch_entries(
        &self,
        municipality_id: &str,
        street: &str,
    ) -> Result<Vec<RawCollectionEntry>>;
}

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    /// List every municipality of the directory.
    ///
    /// A failed request is logged and yields no municipalities.
    pub async fn list_municipalities(&self) -> Vec<MunicipalityRecord> {
        match self.get_document(self.municipalities_url()).await {
            Ok(html) => directory::parse_municipalities(&html),
            Err(err) => {
                log::error!("error fetching municipalities: {err:#}");
                vec![]
            }
        }
    }

    /// List the streets of a municipality.
    ///
    /// A failed request is logged and yields no streets and an unknown municipality name.
    pub async fn list_streets(&self, municipality_id: &str) -> StreetQueryResult {
        match self.get_document(self.streets_url(municipality_id)).await {
            Ok(html) => directory::parse_streets(&html),
            Err(err) => {
                log::error!("error fetching streets of {municipality_id}: {err:#}");
                StreetQueryResult::unknown()
            }
        }
    }

    /// Get the raw collection entries of a street.
    ///
    /// A failed request is logged and yields no entries.
    pub async fn fetch_schedule(
        &self,
        municipality_id: &str,
        street: &str,
    ) -> Vec<RawCollectionEntry> {
        match self
            .get_document(self.schedule_url(municipality_id, street))
            .await
        {
            Ok(html) => schedule::parse(&html),
            Err(err) => {
                log::error!("error fetching schedule of {street} in {municipality_id}: {err:#}");
                vec![]
            }
        }
    }

    /// Get a page, treating every non-2xx status as a failure.
    async fn get_document(&self, url: Url) -> Result<String> {
        log::debug!("GET {url}");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    fn municipalities_url(&self) -> Url {
        self.base_url.clone()
    }

    fn streets_url(&self, municipality_id: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(MUNICIPALITY_PARAM, municipality_id);
        url
    }

    fn schedule_url(&self, municipality_id: &str, street: &str) -> Url {
        let mut url = self.streets_url(municipality_id);
        let query = format!(
            "{}&{STREET_PARAM}={}",
            url.query().unwrap_or_default(),
            utf8_percent_encode(street, STREET_ENCODE_SET)
        );
        url.set_query(Some(&query));
        url
    }
}

#[async_trait]
impl ScheduleSource for Client {
    async fn fetch_entries(
        &self,
        municipality_id: &str,
        street: &str,
    ) -> Result<Vec<RawCollectionEntry>> {
        Ok(self.fetch_schedule(municipality_id, street).await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Url;

    use crate::{
        client::Client,
        config::{ClientConfig, DEFAULT_BASE_URL},
    };

    fn get_test_client(base_url: &str) -> Client {
        Client::new(ClientConfig {
            base_url: Url::parse(base_url).unwrap(),
            request_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let client = get_test_client(DEFAULT_BASE_URL);
        assert_eq!(client.municipalities_url().as_str(), DEFAULT_BASE_URL);
        assert_eq!(
            client.streets_url("101").as_str(),
            format!("{DEFAULT_BASE_URL}?gmina_id=101")
        );
        assert_eq!(
            client.schedule_url("101", "Ks. Jana Twardowskiego").as_str(),
            format!("{DEFAULT_BASE_URL}?gmina_id=101&ulica=Ks.%20Jana%20Twardowskiego")
        );
        assert_eq!(
            client.schedule_url("101", "Leśna & Polna").as_str(),
            format!("{DEFAULT_BASE_URL}?gmina_id=101&ulica=Le%C5%9Bna%20%26%20Polna")
        );
        assert_eq!(
            client.schedule_url("101", "Al. 1+2/3").as_str(),
            format!("{DEFAULT_BASE_URL}?gmina_id=101&ulica=Al.%201%2B2/3")
        );
    }

    /// Transport failures degrade to empty results.
    ///
    /// Nothing listens on the discard port, so this test stays offline.
    #[tokio::test]
    async fn test_transport_failure() {
        let client = get_test_client("http://127.0.0.1:9/HarmonogramOnline.dll");
        assert!(client.list_municipalities().await.is_empty());
        let streets = client.list_streets("101").await;
        assert!(streets.streets.is_empty());
        assert_eq!(
            streets.municipality_name,
            crate::directory::UNKNOWN_MUNICIPALITY
        );
        assert!(client.fetch_schedule("101", "Leśna").await.is_empty());
    }

    /// Test whether requests can be sent and the directory contains something.
    ///
    /// This is an online test!
    #[tokio::test]
    #[ignore = "online test"]
    async fn test_list_municipalities() {
        let client = Client::new(ClientConfig::default()).unwrap();
        assert!(!client.list_municipalities().await.is_empty());
    }
}
