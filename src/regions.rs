//! Country to region mapping
//!
//! Countries share road-geometry datasets per region. The index is loaded once
//! from a JSON document of the form `{"Region 1": ["Canada", ...], ...}` and is
//! read-only afterwards.

use crate::error::{Result, ScraperError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Read-only lookup from country name to region name
#[derive(Debug, Clone, Default)]
pub struct CountryRegionIndex {
    country_to_region: HashMap<String, String>,
    regions: Vec<String>,
}

impl CountryRegionIndex {
    /// Build an index from region → countries pairs
    ///
    /// A country listed under several regions resolves to the first region in
    /// iteration order.
    pub fn from_regions<I, R, C>(regions: I) -> Self
    where
        I: IntoIterator<Item = (R, Vec<C>)>,
        R: Into<String>,
        C: Into<String>,
    {
        let mut index = Self::default();
        for (region, countries) in regions {
            let region = region.into();
            for country in countries {
                let country = country.into().trim().to_string();
                if let Some(existing) = index.country_to_region.get(&country) {
                    log::warn!(
                        "{} listed under both {} and {}; keeping {}",
                        country,
                        existing,
                        region,
                        existing
                    );
                    continue;
                }
                index.country_to_region.insert(country, region.clone());
            }
            index.regions.push(region);
        }
        index
    }

    /// Parse the index from JSON text
    ///
    /// # Errors
    /// Returns `ScraperError::InvalidConfig` if the document is not an object of
    /// string arrays
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| {
                ScraperError::invalid_config(format!("Invalid country/region index: {e}"))
            })?;

        // The map keeps document order, so earlier regions win duplicates.
        let regions = document
            .into_iter()
            .map(|(region, countries)| {
                let countries: Vec<String> = serde_json::from_value(countries).map_err(|e| {
                    ScraperError::invalid_config(format!("Invalid country list for {region}: {e}"))
                })?;
                Ok((region, countries))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_regions(regions))
    }

    /// Load the index from a JSON file
    ///
    /// # Errors
    /// - File cannot be read
    /// - File content is not a valid index document
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ScraperError::file_io_error("read country/region index", path, &e))?;
        let index = Self::from_json_str(&content)?;
        log::info!(
            "Loaded {} countries across {} regions from {}",
            index.country_count(),
            index.regions.len(),
            path.display()
        );
        Ok(index)
    }

    /// Region a country belongs to
    #[must_use]
    pub fn region_of(&self, country: &str) -> Option<&str> {
        self.country_to_region.get(country.trim()).map(String::as_str)
    }

    /// Region a country belongs to, or `UnknownCountry`
    ///
    /// # Errors
    /// Returns `ScraperError::UnknownCountry` when the country is not indexed
    pub fn resolve(&self, country: &str) -> Result<&str> {
        self.region_of(country)
            .ok_or_else(|| ScraperError::unknown_country(country.trim()))
    }

    /// Region names in document order
    #[must_use]
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    #[must_use]
    pub fn country_count(&self) -> usize {
        self.country_to_region.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_JSON: &str = r#"{
        "Region 4": ["France", "Germany", "Spain"],
        "Region 1": ["Canada", "United States"],
        "Region 6": ["Australia"]
    }"#;

    #[test]
    fn test_resolve_known_countries() {
        let index = CountryRegionIndex::from_json_str(INDEX_JSON).unwrap();
        assert_eq!(index.resolve("France").unwrap(), "Region 4");
        assert_eq!(index.resolve("Canada").unwrap(), "Region 1");
        assert_eq!(index.resolve(" Australia ").unwrap(), "Region 6");
        assert_eq!(index.country_count(), 6);
    }

    #[test]
    fn test_unknown_country() {
        let index = CountryRegionIndex::from_json_str(INDEX_JSON).unwrap();
        let err = index.resolve("Atlantis").unwrap_err();
        assert!(matches!(err, ScraperError::UnknownCountry(ref c) if c == "Atlantis"));
    }

    #[test]
    fn test_first_region_wins_for_duplicates() {
        let index = CountryRegionIndex::from_regions(vec![
            ("Region 2", vec!["Mexico"]),
            ("Region 1", vec!["Mexico", "Canada"]),
        ]);
        assert_eq!(index.resolve("Mexico").unwrap(), "Region 2");
        assert_eq!(index.regions(), &["Region 2".to_string(), "Region 1".to_string()]);
    }

    #[test]
    fn test_json_document_order_is_kept() {
        let index = CountryRegionIndex::from_json_str(
            r#"{"Region 2": ["Mexico"], "Region 10": ["Mexico", "Chile"], "Region 1": ["Canada"]}"#,
        )
        .unwrap();

        assert_eq!(
            index.regions(),
            &["Region 2".to_string(), "Region 10".to_string(), "Region 1".to_string()]
        );
        assert_eq!(index.resolve("Mexico").unwrap(), "Region 2");
        assert_eq!(index.resolve("Chile").unwrap(), "Region 10");
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = CountryRegionIndex::from_json_str(r#"{"Region 1": "Canada"}"#).unwrap_err();
        assert!(matches!(err, ScraperError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = CountryRegionIndex::from_path("/nonexistent/regions.json").unwrap_err();
        assert!(matches!(err, ScraperError::Io(_)));
        assert!(err.to_string().contains("read country/region index"));
    }
}
