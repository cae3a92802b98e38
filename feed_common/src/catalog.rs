//! Seed instruments and static descriptions.
//!
//! A `Catalog` is the reference data behind the instrument repository: the full
//! instrument set used to seed the service cache plus the ticker → description lookup
//! used to enrich inbound updates. It is either the built-in stock list or parsed from
//! a catalog file.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::FeedError;
use crate::instrument::Instrument;

/// Trait providing file parsing for catalogs.
pub trait CatalogParser: Sized {
    /// Parses a catalog from a buffered reader.
    ///
    /// Each non-empty, non-comment line holds one instrument as
    /// `TICKER|Name|price|description`; the description column is optional.
    /// Returns an error naming the first offending line.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Self, FeedError>;
}

/// Ordered set of seed instruments keyed by ticker.
#[derive(Debug, Clone)]
pub struct Catalog {
    instruments: Vec<Instrument>,
    descriptions: HashMap<String, String>,
}

impl CatalogParser for Catalog {
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Self, FeedError> {
        let mut instruments = Vec::new();
        let mut seen = HashSet::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(FeedError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            let instrument = parse_line(trimmed_line).map_err(|reason| FeedError::ParseCatalog {
                line: index + 1,
                reason,
            })?;
            if !seen.insert(instrument.ticker.clone()) {
                return Err(FeedError::ParseCatalog {
                    line: index + 1,
                    reason: format!("duplicate ticker {}", instrument.ticker),
                });
            }
            instruments.push(instrument);
        }
        Ok(Catalog::from_instruments(instruments))
    }
}

fn parse_line(line: &str) -> Result<Instrument, String> {
    let mut columns = line.splitn(4, '|').map(str::trim);
    let ticker = columns.next().filter(|t| !t.is_empty()).ok_or("missing ticker")?;
    let name = columns.next().filter(|n| !n.is_empty()).ok_or("missing name")?;
    let price = columns.next().ok_or("missing price")?;
    let price = Decimal::from_str(price).map_err(|e| format!("invalid price {:?}: {}", price, e))?;
    if price <= Decimal::ZERO {
        return Err(format!("price must be positive, got {}", price));
    }
    let description = columns
        .next()
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(Instrument::new(ticker.to_uppercase(), name, price).with_description(description))
}

impl Catalog {
    /// Builds a catalog from instruments; descriptions are taken from the instruments themselves.
    pub fn from_instruments(instruments: Vec<Instrument>) -> Self {
        let descriptions = instruments
            .iter()
            .filter_map(|i| i.description.clone().map(|d| (i.ticker.clone(), d)))
            .collect();
        Catalog {
            instruments,
            descriptions,
        }
    }

    /// The built-in set of 25 large-cap stocks.
    pub fn builtin() -> Self {
        let instruments = BUILTIN
            .iter()
            .map(|(ticker, name, cents, description)| {
                Instrument::new(*ticker, *name, Decimal::new(*cents, 2))
                    .with_description(Some((*description).to_string()))
            })
            .collect();
        Catalog::from_instruments(instruments)
    }

    /// Seed instruments in catalog order.
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Static description for `ticker`, if the catalog has one.
    pub fn description(&self, ticker: &str) -> Option<&str> {
        self.descriptions.get(ticker).map(String::as_str)
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether the catalog holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

const BUILTIN: &[(&str, &str, i64, &str)] = &[
    ("AAPL", "Apple Inc.", 18995, "Apple Inc. designs, manufactures, and markets smartphones, personal computers, tablets, wearables, and accessories worldwide."),
    ("MSFT", "Microsoft Corporation", 37485, "Microsoft Corporation develops, licenses, and supports software, services, devices, and solutions worldwide."),
    ("GOOGL", "Alphabet Inc.", 14035, "Alphabet Inc. provides various products and services worldwide, including Google Search, advertising, cloud computing, and hardware products."),
    ("AMZN", "Amazon.com Inc.", 15175, "Amazon.com Inc. engages in the retail sale of consumer products and subscriptions through online and physical stores."),
    ("META", "Meta Platforms Inc.", 32845, "Meta Platforms Inc. engages in the development of social technology and metaverse products connecting people worldwide."),
    ("TSLA", "Tesla Inc.", 24280, "Tesla Inc. designs, develops, manufactures, and sells electric vehicles, solar energy generation, and energy storage products."),
    ("NVDA", "NVIDIA Corporation", 49522, "NVIDIA Corporation provides graphics, computing, and networking solutions worldwide, specializing in GPU technology."),
    ("JPM", "JPMorgan Chase & Co.", 15830, "JPMorgan Chase & Co. operates as a financial services company providing investment banking, financial services, and asset management."),
    ("V", "Visa Inc.", 26790, "Visa Inc. operates as a payments technology company worldwide, facilitating digital payments between consumers and merchants."),
    ("JNJ", "Johnson & Johnson", 15945, "Johnson & Johnson researches, develops, manufactures, and sells various products in healthcare worldwide."),
    ("WMT", "Walmart Inc.", 16372, "Walmart Inc. engages in the operation of retail, wholesale, and other units worldwide."),
    ("PG", "Procter & Gamble Co.", 16350, "The Procter & Gamble Company provides branded consumer packaged goods worldwide."),
    ("MA", "Mastercard Inc.", 42518, "Mastercard Incorporated provides transaction processing and payment services worldwide."),
    ("UNH", "UnitedHealth Group Inc.", 52065, "UnitedHealth Group Incorporated operates as a diversified healthcare company in the United States."),
    ("HD", "The Home Depot Inc.", 38540, "The Home Depot Inc. operates as a home improvement retailer providing building materials and home improvement products."),
    ("DIS", "The Walt Disney Company", 9530, "The Walt Disney Company operates as an entertainment company worldwide, producing content and operating theme parks."),
    ("BAC", "Bank of America Corp.", 3875, "Bank of America Corporation provides banking and financial products and services for individual consumers and businesses."),
    ("NFLX", "Netflix Inc.", 48560, "Netflix Inc. provides entertainment services worldwide, offering streaming content including TV series and films."),
    ("ADBE", "Adobe Inc.", 49820, "Adobe Inc. provides digital media and marketing solutions worldwide, including creative software and document solutions."),
    ("CRM", "Salesforce Inc.", 26585, "Salesforce Inc. provides customer relationship management technology and applications worldwide."),
    ("CSCO", "Cisco Systems Inc.", 5245, "Cisco Systems Inc. designs, manufactures, and sells networking and communications technology and services."),
    ("PEP", "PepsiCo Inc.", 17230, "PepsiCo Inc. manufactures, markets, and sells various beverages, foods, and snacks worldwide."),
    ("KO", "The Coca-Cola Company", 6325, "The Coca-Cola Company manufactures and sells various beverages worldwide, including soft drinks and water products."),
    ("INTC", "Intel Corporation", 2415, "Intel Corporation designs, develops, manufactures, and sells computing and communications products worldwide."),
    ("NKE", "Nike Inc.", 7890, "Nike Inc. designs, develops, markets, and sells athletic footwear, apparel, equipment, and accessories worldwide."),
];
