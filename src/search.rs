// src/search.rs
//
// Search-URL construction for the LinkedIn jobs search. Pure string work,
// no I/O.

const BASE_URL: &str = "https://www.linkedin.com/jobs/search/";

/// Source pagination is fixed at 25 results per page.
pub const PAGE_SIZE: u32 = 25;

/// Contract-type labels accepted from callers, mapped to the source's
/// `f_JT` codes. Lookup is case-insensitive; unknown labels are dropped.
const CONTRACT_TYPE_CODES: &[(&str, &str)] = &[
    ("cdi", "F"),
    ("cdd", "C"),
    ("stage", "I"),
    ("freelance", "T"),
    ("alternance", "P"),
];

fn contract_code(label: &str) -> Option<&'static str> {
    let label = label.to_lowercase();
    CONTRACT_TYPE_CODES
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, code)| *code)
}

/// Builds the search URL for one result page. Empty inputs omit their query
/// parameter entirely; `start` is always present (`page_offset * 25`).
pub fn build_search_url(
    keywords: &[String],
    locations: &[String],
    contract_types: &[String],
    page_offset: u32,
) -> String {
    let mut params: Vec<String> = Vec::with_capacity(4);

    if !keywords.is_empty() {
        let joined = keywords.join(" ");
        params.push(format!("keywords={}", urlencoding::encode(&joined)));
    }

    if !locations.is_empty() {
        let joined = locations.join(", ");
        params.push(format!("location={}", urlencoding::encode(&joined)));
    }

    let codes: Vec<&str> = contract_types
        .iter()
        .filter_map(|label| contract_code(label))
        .collect();
    if !codes.is_empty() {
        let joined = codes.join(",");
        params.push(format!("f_JT={}", urlencoding::encode(&joined)));
    }

    params.push(format!("start={}", page_offset * PAGE_SIZE));

    format!("{}?{}", BASE_URL, params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn page_offset_scales_by_batch_size() {
        let url = build_search_url(&owned(&["rust"]), &[], &[], 2);
        assert!(url.contains("start=50"), "{url}");

        let url = build_search_url(&owned(&["rust"]), &[], &[], 0);
        assert!(url.contains("start=0"), "{url}");
    }

    #[test]
    fn empty_inputs_omit_their_parameters() {
        let url = build_search_url(&[], &[], &[], 0);
        assert!(!url.contains("keywords="), "{url}");
        assert!(!url.contains("location="), "{url}");
        assert!(!url.contains("f_JT="), "{url}");
        assert!(url.contains("start=0"), "{url}");
    }

    #[test]
    fn present_inputs_emit_their_parameters() {
        let url = build_search_url(
            &owned(&["python", "backend"]),
            &owned(&["Paris", "Lyon"]),
            &owned(&["cdi"]),
            0,
        );
        assert!(url.contains("keywords=python%20backend"), "{url}");
        assert!(url.contains("location=Paris%2C%20Lyon"), "{url}");
        assert!(url.contains("f_JT=F"), "{url}");
    }

    #[test]
    fn contract_lookup_is_case_insensitive_and_drops_unknowns() {
        let url = build_search_url(&[], &[], &owned(&["CDI", "cdd", "volunteer"]), 0);
        assert!(url.contains("f_JT=F%2CC"), "{url}");
    }

    #[test]
    fn all_unknown_contract_types_omit_the_parameter() {
        let url = build_search_url(&[], &[], &owned(&["volunteer", "other"]), 1);
        assert!(!url.contains("f_JT="), "{url}");
        assert!(url.contains("start=25"), "{url}");
    }

    #[test]
    fn url_has_no_dangling_separators() {
        let url = build_search_url(&[], &[], &[], 0);
        assert_eq!(url, format!("{}?start=0", BASE_URL));
    }
}
