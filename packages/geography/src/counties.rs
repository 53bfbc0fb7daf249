//! California county directory.
//!
//! Static name/FIPS lookup for the 58 California counties. The dataset
//! keys counties by FIPS; boundary documents key them by name, so both
//! directions are needed.

use anomaly_map_geography_models::CountyFips;

/// One county directory entry.
#[derive(Debug, Clone, Copy)]
pub struct CaCounty {
    /// County name as it appears in boundary documents.
    pub name: &'static str,
    /// County FIPS code.
    pub fips: CountyFips,
}

const fn county(name: &'static str, fips: u32) -> CaCounty {
    CaCounty {
        name,
        fips: CountyFips::new(fips),
    }
}

/// The 58 California counties.
pub const CA_COUNTIES: &[CaCounty] = &[
    county("Alameda", 6001),
    county("Alpine", 6003),
    county("Amador", 6005),
    county("Butte", 6007),
    county("Calaveras", 6009),
    county("Colusa", 6011),
    county("Contra Costa", 6013),
    county("Del Norte", 6015),
    county("El Dorado", 6017),
    county("Fresno", 6019),
    county("Glenn", 6021),
    county("Humboldt", 6023),
    county("Imperial", 6025),
    county("Inyo", 6027),
    county("Kern", 6029),
    county("Kings", 6031),
    county("Lake", 6033),
    county("Lassen", 6035),
    county("Los Angeles", 6037),
    county("Madera", 6039),
    county("Marin", 6041),
    county("Mariposa", 6043),
    county("Mendocino", 6045),
    county("Merced", 6047),
    county("Modoc", 6049),
    county("Mono", 6051),
    county("Monterey", 6053),
    county("Napa", 6055),
    county("Nevada", 6057),
    county("Orange", 6059),
    county("Placer", 6061),
    county("Plumas", 6063),
    county("Riverside", 6065),
    county("Sacramento", 6067),
    county("San Benito", 6069),
    county("San Bernardino", 6071),
    county("San Diego", 6073),
    county("San Francisco", 6075),
    county("San Joaquin", 6077),
    county("San Luis Obispo", 6079),
    county("San Mateo", 6081),
    county("Santa Barbara", 6083),
    county("Santa Clara", 6085),
    county("Santa Cruz", 6087),
    county("Shasta", 6089),
    county("Sierra", 6091),
    county("Siskiyou", 6093),
    county("Solano", 6095),
    county("Sonoma", 6097),
    county("Stanislaus", 6099),
    county("Sutter", 6101),
    county("Tehama", 6103),
    county("Trinity", 6105),
    county("Tulare", 6107),
    county("Tuolumne", 6109),
    county("Ventura", 6111),
    county("Yolo", 6113),
    county("Yuba", 6115),
];

/// Looks up a county's FIPS code by name.
#[must_use]
pub fn county_fips(name: &str) -> Option<CountyFips> {
    CA_COUNTIES
        .iter()
        .find(|county| county.name == name)
        .map(|county| county.fips)
}

/// Looks up a county's name by FIPS code.
#[must_use]
pub fn county_name(fips: CountyFips) -> Option<&'static str> {
    CA_COUNTIES
        .iter()
        .find(|county| county.fips == fips)
        .map(|county| county.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_covers_all_counties() {
        assert_eq!(CA_COUNTIES.len(), 58);
    }

    #[test]
    fn name_fips_roundtrip() {
        for county in CA_COUNTIES {
            assert_eq!(county_fips(county.name), Some(county.fips));
            assert_eq!(county_name(county.fips), Some(county.name));
        }
    }

    #[test]
    fn unknown_lookups_return_none() {
        assert_eq!(county_fips("King County"), None);
        assert_eq!(county_name(CountyFips::new(48201)), None);
    }

    #[test]
    fn fips_codes_are_odd_and_in_state_range() {
        for county in CA_COUNTIES {
            let value = county.fips.value();
            assert!((6001..=6115).contains(&value));
            assert_eq!(value % 2, 1);
        }
    }
}
