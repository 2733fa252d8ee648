//! Market universe: which symbols each market tracks, with company name and sector.
//!
//! The built-in lists can be replaced by a TOML file:
//!
//! ```toml
//! [[markets.IBEX35]]
//! symbol = "SAN.MC"
//! name = "Banco Santander"
//! sector = "Banking"
//! ```

use super::market::{Market, UnknownMarket};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A tracked company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub symbol: String,
    pub name: String,
    pub sector: String,
}

/// Symbols per market, keyed by canonical market key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub markets: BTreeMap<String, Vec<Listing>>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read universe file: {e}"))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    ///
    /// Market keys may use any alias `Market` accepts and are stored under the
    /// canonical key. Unknown markets and a symbol listed twice in one market
    /// are rejected.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let parsed: Self =
            toml::from_str(content).map_err(|e| format!("parse universe TOML: {e}"))?;

        let mut markets: BTreeMap<String, Vec<Listing>> = BTreeMap::new();
        for (key, listings) in parsed.markets {
            let market: Market = key.parse().map_err(|e: UnknownMarket| e.to_string())?;
            let entry = markets.entry(market.key().to_string()).or_default();
            for listing in listings {
                if entry.iter().any(|l| l.symbol == listing.symbol) {
                    return Err(format!(
                        "duplicate symbol '{}' in {market} universe",
                        listing.symbol
                    ));
                }
                entry.push(listing);
            }
        }
        Ok(Self { markets })
    }

    /// Listings for a market. Empty when the market is not configured.
    pub fn listings(&self, market: Market) -> &[Listing] {
        self.markets
            .get(market.key())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn symbols(&self, market: Market) -> Vec<&str> {
        self.listings(market)
            .iter()
            .map(|l| l.symbol.as_str())
            .collect()
    }

    pub fn listing(&self, market: Market, symbol: &str) -> Option<&Listing> {
        self.listings(market).iter().find(|l| l.symbol == symbol)
    }

    /// Distinct sector names for a market, sorted.
    pub fn sectors(&self, market: Market) -> Vec<&str> {
        self.listings(market)
            .iter()
            .map(|l| l.sector.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn symbol_count(&self, market: Market) -> usize {
        self.listings(market).len()
    }

    /// The built-in lists: IBEX 35, Spanish continuous-market mid caps,
    /// and the top 25 of the S&P 500 and NASDAQ by capitalization.
    pub fn builtin() -> Self {
        let mut markets = BTreeMap::new();
        markets.insert(Market::Ibex35.key().to_string(), listings(IBEX35));
        markets.insert(
            Market::MediumCapSpain.key().to_string(),
            listings(SPAIN_MEDIUM_CAP),
        );
        markets.insert(Market::Sp500.key().to_string(), listings(SP500_TOP25));
        markets.insert(Market::Nasdaq.key().to_string(), listings(NASDAQ_TOP25));
        Self { markets }
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::builtin()
    }
}

fn listings(rows: &[(&str, &str, &str)]) -> Vec<Listing> {
    rows.iter()
        .map(|(symbol, name, sector)| Listing {
            symbol: symbol.to_string(),
            name: name.to_string(),
            sector: sector.to_string(),
        })
        .collect()
}

const IBEX35: &[(&str, &str, &str)] = &[
    ("ITX.MC", "Inditex", "Retail"),
    ("IBE.MC", "Iberdrola", "Utilities"),
    ("SAN.MC", "Banco Santander", "Banking"),
    ("BBVA.MC", "BBVA", "Banking"),
    ("TEF.MC", "Telefonica", "Telecom"),
    ("REP.MC", "Repsol", "Energy"),
    ("CABK.MC", "CaixaBank", "Banking"),
    ("ENG.MC", "Enagas", "Utilities"),
    ("FER.MC", "Ferrovial", "Construction"),
    ("ACS.MC", "ACS", "Construction"),
    ("AENA.MC", "Aena", "Transport"),
    ("AMS.MC", "Amadeus", "Technology"),
    ("ANA.MC", "Acciona", "Energy"),
    ("CLNX.MC", "Cellnex", "Telecom"),
    ("IAG.MC", "IAG", "Transport"),
    ("GRF.MC", "Grifols", "Pharma"),
    ("MAP.MC", "Mapfre", "Insurance"),
    ("MEL.MC", "Melia Hotels", "Tourism"),
    ("MRL.MC", "Merlin Properties", "Real Estate"),
    ("RED.MC", "Redeia", "Utilities"),
    ("SAB.MC", "Banco Sabadell", "Banking"),
    ("SCYR.MC", "Sacyr", "Construction"),
    ("SGRE.MC", "Siemens Gamesa", "Industrial"),
    ("UNI.MC", "Unicaja", "Banking"),
    ("ACX.MC", "Acerinox", "Industrial"),
    ("BKT.MC", "Bankinter", "Banking"),
    ("COL.MC", "Inmobiliaria Colonial", "Real Estate"),
    ("FDR.MC", "Fluidra", "Industrial"),
    ("IDR.MC", "Indra", "Technology"),
    ("LOG.MC", "Logista", "Logistics"),
    ("NTGY.MC", "Naturgy", "Utilities"),
    ("PHM.MC", "PharmaMar", "Pharma"),
    ("REN.MC", "Talgo", "Transport"),
    ("SLR.MC", "Solaria", "Energy"),
    ("VIS.MC", "Viscofan", "Industrial"),
];

const SPAIN_MEDIUM_CAP: &[(&str, &str, &str)] = &[
    ("ELE.MC", "Endesa", "Utilities"),
    ("EBRO.MC", "Ebro Foods", "Food"),
    ("GCO.MC", "Gestamp", "Automotive"),
    ("ALM.MC", "Almirall", "Pharma"),
    ("VID.MC", "Vidrala", "Industrial"),
    ("CIE.MC", "CIE Automotive", "Automotive"),
    ("TRE.MC", "Tecnicas Reunidas", "Construction"),
    ("CAF.MC", "CAF", "Industrial"),
    ("FCC.MC", "FCC", "Construction"),
    ("PSG.MC", "Prosegur Cash", "Services"),
    ("ENC.MC", "Ence", "Utilities"),
    ("NHH.MC", "NH Hotel Group", "Tourism"),
    ("APAM.MC", "Applus", "Services"),
    ("TUB.MC", "Tubacex", "Industrial"),
    ("FAE.MC", "Faes Farma", "Pharma"),
    ("ZOT.MC", "Zardoya Otis", "Industrial"),
    ("NXT.MC", "Neinor Homes", "Real Estate"),
    ("MVC.MC", "Miquel y Costas", "Industrial"),
    ("ACS.MC", "Construcciones ACS", "Construction"),
    ("DIA.MC", "DIA", "Retail"),
    ("PRISA.MC", "Prisa", "Media"),
    ("BME.MC", "BME", "Financial"),
    ("OHL.MC", "OHL", "Construction"),
    ("AZK.MC", "Azkoyen", "Industrial"),
    ("LGT.MC", "Lingotes Especiales", "Industrial"),
];

const SP500_TOP25: &[(&str, &str, &str)] = &[
    ("AAPL", "Apple", "Technology"),
    ("MSFT", "Microsoft", "Technology"),
    ("NVDA", "NVIDIA", "Technology"),
    ("GOOGL", "Alphabet", "Technology"),
    ("AMZN", "Amazon", "Consumer"),
    ("META", "Meta Platforms", "Technology"),
    ("BRK-B", "Berkshire Hathaway", "Financial"),
    ("TSLA", "Tesla", "Automotive"),
    ("LLY", "Eli Lilly", "Healthcare"),
    ("V", "Visa", "Financial"),
    ("UNH", "UnitedHealth", "Healthcare"),
    ("XOM", "Exxon Mobil", "Energy"),
    ("MA", "Mastercard", "Financial"),
    ("JNJ", "Johnson & Johnson", "Healthcare"),
    ("PG", "Procter & Gamble", "Consumer"),
    ("AVGO", "Broadcom", "Technology"),
    ("JPM", "JPMorgan Chase", "Financial"),
    ("HD", "Home Depot", "Retail"),
    ("CVX", "Chevron", "Energy"),
    ("ABBV", "AbbVie", "Healthcare"),
    ("MRK", "Merck", "Healthcare"),
    ("COST", "Costco", "Retail"),
    ("KO", "Coca-Cola", "Consumer"),
    ("ORCL", "Oracle", "Technology"),
    ("WMT", "Walmart", "Retail"),
];

const NASDAQ_TOP25: &[(&str, &str, &str)] = &[
    ("AAPL", "Apple", "Technology"),
    ("MSFT", "Microsoft", "Technology"),
    ("NVDA", "NVIDIA", "Technology"),
    ("GOOGL", "Alphabet", "Technology"),
    ("AMZN", "Amazon", "Consumer"),
    ("META", "Meta Platforms", "Technology"),
    ("TSLA", "Tesla", "Automotive"),
    ("AVGO", "Broadcom", "Technology"),
    ("COST", "Costco", "Retail"),
    ("NFLX", "Netflix", "Media"),
    ("AMD", "AMD", "Technology"),
    ("ADBE", "Adobe", "Technology"),
    ("CSCO", "Cisco", "Technology"),
    ("INTC", "Intel", "Technology"),
    ("CMCSA", "Comcast", "Media"),
    ("PEP", "PepsiCo", "Consumer"),
    ("QCOM", "Qualcomm", "Technology"),
    ("TXN", "Texas Instruments", "Technology"),
    ("INTU", "Intuit", "Technology"),
    ("AMGN", "Amgen", "Healthcare"),
    ("AMAT", "Applied Materials", "Technology"),
    ("ISRG", "Intuitive Surgical", "Healthcare"),
    ("BKNG", "Booking Holdings", "Travel"),
    ("HON", "Honeywell", "Industrial"),
    ("VRTX", "Vertex Pharmaceuticals", "Healthcare"),
];
