// src/extract.rs
//
// HTML extraction for search-results cards and offer detail pages. Selectors
// track the source markup observed at the time of writing; extraction is
// best-effort and a missing block yields the "N/A" placeholder rather than
// an error.

use log::{debug, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::browser::PageSource;
use crate::models::{JobStub, OfferDetails, NOT_AVAILABLE};

/// Collapses an element's text nodes into a single whitespace-normalized
/// string.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn text_or_placeholder(el: Option<ElementRef<'_>>) -> String {
    match el.map(element_text) {
        Some(text) if !text.is_empty() => text,
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Parses search-results pages into [`JobStub`]s.
pub struct ListingExtractor {
    card: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    link: Selector,
}

impl ListingExtractor {
    pub fn new() -> Self {
        ListingExtractor {
            card: Selector::parse("div.base-card").unwrap(),
            title: Selector::parse("h3.base-search-card__title").unwrap(),
            company: Selector::parse("h4.base-search-card__subtitle").unwrap(),
            location: Selector::parse("span.job-search-card__location").unwrap(),
            link: Selector::parse("a.base-card__full-link").unwrap(),
        }
    }

    /// One stub per result card. A card missing a field still produces a
    /// stub, with "N/A" standing in for whatever was absent.
    pub fn extract_stubs(&self, html: &str) -> Vec<JobStub> {
        let document = Html::parse_document(html);
        let mut stubs = Vec::new();

        for card in document.select(&self.card) {
            let title = text_or_placeholder(card.select(&self.title).next());
            let company = text_or_placeholder(card.select(&self.company).next());
            let location = text_or_placeholder(card.select(&self.location).next());
            let detail_url = card
                .select(&self.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| href.trim().to_string())
                .filter(|href| !href.is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());

            stubs.push(JobStub { title, company, location, detail_url });
        }

        debug!("extracted {} stubs from listing page", stubs.len());
        stubs
    }
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses offer detail pages into [`OfferDetails`].
pub struct DetailExtractor {
    description: Selector,
    recruiter_primary: Selector,
    recruiter_fallback: Selector,
    email: Regex,
}

impl DetailExtractor {
    pub fn new() -> Self {
        DetailExtractor {
            description: Selector::parse("div.show-more-less-html__markup").unwrap(),
            recruiter_primary: Selector::parse("a.topcard__org-name-link").unwrap(),
            recruiter_fallback: Selector::parse("span.topcard__flavor").unwrap(),
            email: Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+").unwrap(),
        }
    }

    /// Never fails; any block the page lacks comes back as "N/A".
    pub fn extract(&self, html: &str) -> OfferDetails {
        let document = Html::parse_document(html);

        let description = text_or_placeholder(document.select(&self.description).next());

        // Two alternate placements in the wild; first match wins.
        let recruiter_name = text_or_placeholder(
            document
                .select(&self.recruiter_primary)
                .next()
                .or_else(|| document.select(&self.recruiter_fallback).next()),
        );

        let email = if description != NOT_AVAILABLE {
            self.email
                .find(&description)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        } else {
            NOT_AVAILABLE.to_string()
        };

        OfferDetails { description, recruiter_name, email }
    }
}

impl Default for DetailExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Visits a stub's detail page and extracts its enrichment fields. A fetch
/// failure degrades to the all-"N/A" result; one bad offer never aborts the
/// batch.
pub async fn fetch_offer_details<B: PageSource>(
    browser: &B,
    extractor: &DetailExtractor,
    detail_url: &str,
) -> OfferDetails {
    match browser.fetch_rendered_html(detail_url).await {
        Ok(html) => extractor.extract(&html),
        Err(e) => {
            warn!("detail fetch failed for {detail_url}: {e}");
            OfferDetails::unavailable()
        }
    }
}
