// src/filter.rs
//
// Offer filtering. The text pass is free and runs first; the contract-type
// pass costs one detail fetch per surviving stub and runs only when contract
// types were requested.

use log::info;

use crate::browser::PageSource;
use crate::extract::{fetch_offer_details, DetailExtractor};
use crate::models::JobStub;

fn any_substring(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}

/// Keeps stubs whose title matches any of `title_keywords` AND whose location
/// matches any of `desired_locations`. An empty list passes everything for
/// its predicate. Case-insensitive substring matching throughout.
pub fn filter_by_text(
    stubs: Vec<JobStub>,
    title_keywords: &[String],
    desired_locations: &[String],
) -> Vec<JobStub> {
    stubs
        .into_iter()
        .filter(|stub| {
            (title_keywords.is_empty() || any_substring(&stub.title, title_keywords))
                && (desired_locations.is_empty()
                    || any_substring(&stub.location, desired_locations))
        })
        .collect()
}

/// A stub satisfies a contract-type request when any requested label appears
/// in its title or in the fetched description.
pub fn contract_type_matches(title: &str, description: &str, wanted: &[String]) -> bool {
    any_substring(title, wanted) || any_substring(description, wanted)
}

/// The expensive pass: fetches each candidate's detail page and keeps the
/// stub only if a requested contract type shows up in its title or
/// description. Detail fetch failures degrade to "N/A" text, which simply
/// fails to match.
pub async fn filter_by_contract_type<B: PageSource>(
    browser: &B,
    extractor: &DetailExtractor,
    stubs: Vec<JobStub>,
    wanted: &[String],
) -> Vec<JobStub> {
    let candidates = stubs.len();
    let mut kept = Vec::new();

    for stub in stubs {
        let details = fetch_offer_details(browser, extractor, &stub.detail_url).await;
        if contract_type_matches(&stub.title, &details.description, wanted) {
            kept.push(stub);
        }
    }

    info!(
        "contract-type filter kept {}/{} offers",
        kept.len(),
        candidates
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(title: &str, location: &str) -> JobStub {
        JobStub {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: location.to_string(),
            detail_url: "https://jobs.example/view/1".to_string(),
        }
    }

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn title_and_location_predicates_are_anded() {
        let stubs = vec![
            stub("Python Developer", "Paris, France"),
            stub("Python Developer", "Berlin, Germany"),
            stub("Accountant", "Paris, France"),
        ];
        let kept = filter_by_text(stubs, &owned(&["python"]), &owned(&["paris"]));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Python Developer");
        assert_eq!(kept[0].location, "Paris, France");
    }

    #[test]
    fn keywords_are_ored_within_their_list() {
        let stubs = vec![
            stub("Rust Engineer", "Lille"),
            stub("Go Engineer", "Lille"),
            stub("Cook", "Lille"),
        ];
        let kept = filter_by_text(stubs, &owned(&["rust", "go"]), &[]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn empty_predicates_pass_everything() {
        let stubs = vec![stub("A", "X"), stub("B", "Y")];
        let kept = filter_by_text(stubs.clone(), &[], &[]);
        assert_eq!(kept, stubs);
    }

    #[test]
    fn filtering_is_idempotent() {
        let stubs = vec![
            stub("Python Developer", "Paris"),
            stub("Java Developer", "Paris"),
        ];
        let keywords = owned(&["python"]);
        let locations = owned(&["paris"]);
        let once = filter_by_text(stubs, &keywords, &locations);
        let twice = filter_by_text(once.clone(), &keywords, &locations);
        assert_eq!(once, twice);
    }

    #[test]
    fn contract_match_hits_title_or_description() {
        let wanted = owned(&["cdi"]);
        assert!(contract_type_matches("Dev CDI", "nothing here", &wanted));
        assert!(contract_type_matches(
            "Developer",
            "Poste en CDI à pourvoir",
            &wanted
        ));
        assert!(!contract_type_matches(
            "Developer",
            "6-month internship",
            &wanted
        ));
    }

    #[test]
    fn contract_match_is_case_insensitive() {
        assert!(contract_type_matches("dev", "offre CDI", &owned(&["CdI"])));
    }
}
