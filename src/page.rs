//! Page parsers: raw HTML in, one flat record out.
//!
//! Everything that depends on a particular site's markup lives here, behind
//! [`PageParser`]. The scraping driver never looks at markup itself, so
//! pointing it at a different site means adding a parser, not touching the
//! pipeline. Selectors are best-effort: a field whose markup is missing reads
//! as the parser's default instead of failing the page.

use crate::sink::Tabular;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};

/// Column name to value, as produced by one parsed page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRecord {
    fields: HashMap<&'static str, String>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<String>) {
        self.fields.insert(column, value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

impl Tabular for FlatRecord {
    fn value(&self, column: &str) -> Option<&str> {
        self.get(column)
    }
}

pub trait PageParser: Send + Sync {
    /// Output header, in order
    fn columns(&self) -> &'static [&'static str];

    /// Parses the page fetched from `url`. Never fails; unknown markup
    /// produces default values.
    fn parse(&self, url: &str, html: &str) -> FlatRecord;
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().map(text_of)
}

static ENTRY_LINKS: Lazy<Selector> =
    Lazy::new(|| selector("div.js-library-list-outer a.js-librarylink-entry"));

/// Entry links from an exhibitor directory listing, first-seen order, no duplicates.
pub fn collect_entry_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    doc.select(&ENTRY_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty())
        .filter(|href| seen.insert(href.to_string()))
        .map(str::to_string)
        .collect()
}

const NA: &str = "N/A";

static EXHIBITOR_TITLE: Lazy<Selector> =
    Lazy::new(|| selector("h1.m-exhibitor-entry__item__header__infos__title"));
static EXHIBITOR_STAND: Lazy<Selector> =
    Lazy::new(|| selector("div.m-exhibitor-entry__item__header__infos__stand"));
static EXHIBITOR_USP: Lazy<Selector> =
    Lazy::new(|| selector("div.m-exhibitor-entry__item__body__additional__item__value"));
static EXHIBITOR_ADDRESS: Lazy<Selector> =
    Lazy::new(|| selector("div.m-exhibitor-entry__item__body__contacts__address"));
static EXHIBITOR_LIBRARIES: Lazy<Selector> =
    Lazy::new(|| selector("div.m-exhibitor-entry__item__body__libraries"));
static EXHIBITOR_LIBRARY: Lazy<Selector> =
    Lazy::new(|| selector("div.m-exhibitor-entry__item__body__libraries__library"));
static EXHIBITOR_WEBSITE: Lazy<Selector> =
    Lazy::new(|| selector("div.m-exhibitor-entry__item__body__contacts__additional__button a[href]"));
static EXHIBITOR_SOCIAL: Lazy<Selector> = Lazy::new(|| {
    selector("li.m-exhibitor-entry__item__body__contacts__additional__social__item")
});
static H4: Lazy<Selector> = Lazy::new(|| selector("h4"));
static SPAN: Lazy<Selector> = Lazy::new(|| selector("span"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static ANCHOR_HREF: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static WEBSITE_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)website").unwrap());

/// Exhibitor entry pages of an event directory (`m-exhibitor-entry` layout)
pub struct ExhibitorEntryParser;

impl ExhibitorEntryParser {
    pub const COLUMNS: &'static [&'static str] = &[
        "Company Name",
        "Company URL",
        "Stand",
        "Company USP",
        "Address",
        "PRODUCT CATEGORY",
        "INDUSTRIES",
        "SUSTAINABILITY INITIATIVE",
        "Official Website",
        "Facebook handle",
        "LinkedIn handle",
        "Instagram handle",
        "YouTube handle",
    ];

    fn address(doc: &Html) -> String {
        let Some(block) = doc.select(&EXHIBITOR_ADDRESS).next() else {
            return NA.to_string();
        };
        let Some(h4) = block.select(&H4).next() else {
            return String::new();
        };

        let mut parts = Vec::new();
        if let Some(text) = h4.next_sibling().and_then(|n| n.value().as_text()) {
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
        for sibling in h4.next_siblings() {
            let is_br = sibling
                .value()
                .as_element()
                .is_some_and(|e| e.name() == "br");
            if !is_br {
                continue;
            }
            if let Some(text) = sibling.next_sibling().and_then(|n| n.value().as_text()) {
                parts.push(text.trim().to_string());
            }
        }
        parts.join(", ")
    }

    /// Product category, industries, sustainability initiative
    fn libraries(doc: &Html) -> [String; 3] {
        let mut out = [NA.to_string(), NA.to_string(), NA.to_string()];
        let Some(parent) = doc.select(&EXHIBITOR_LIBRARIES).next() else {
            return out;
        };
        for (slot, library) in out.iter_mut().zip(parent.select(&EXHIBITOR_LIBRARY)) {
            *slot = library
                .select(&SPAN)
                .map(|span| span.text().collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
        }
        out
    }

    fn website(doc: &Html) -> String {
        if let Some(href) = doc
            .select(&EXHIBITOR_WEBSITE)
            .next()
            .and_then(|a| a.value().attr("href"))
        {
            return href.to_string();
        }
        doc.select(&ANCHOR_HREF)
            .find(|a| WEBSITE_TEXT.is_match(&a.text().collect::<String>()))
            .and_then(|a| a.value().attr("href"))
            .map_or_else(|| NA.to_string(), str::to_string)
    }

    /// Facebook, LinkedIn, Instagram, YouTube
    fn social(doc: &Html) -> [String; 4] {
        const HOSTS: [&str; 4] = ["facebook.com", "linkedin.com", "instagram.com", "youtube.com"];
        let mut out = [NA.to_string(), NA.to_string(), NA.to_string(), NA.to_string()];
        for item in doc.select(&EXHIBITOR_SOCIAL) {
            let Some(href) = item.select(&ANCHOR).next().and_then(|a| a.value().attr("href"))
            else {
                continue;
            };
            if let Some(slot) = HOSTS.iter().position(|h| href.contains(h)) {
                out[slot] = href.to_string();
            }
        }
        out
    }
}

impl PageParser for ExhibitorEntryParser {
    fn columns(&self) -> &'static [&'static str] {
        Self::COLUMNS
    }

    fn parse(&self, url: &str, html: &str) -> FlatRecord {
        let doc = Html::parse_document(html);
        let text_or_na = |sel: &Selector| first_text(&doc, sel).unwrap_or_else(|| NA.to_string());

        let mut record = FlatRecord::new();
        record.set("Company Name", text_or_na(&EXHIBITOR_TITLE));
        record.set("Company URL", url);
        record.set("Stand", text_or_na(&EXHIBITOR_STAND));
        record.set("Company USP", text_or_na(&EXHIBITOR_USP));
        record.set("Address", Self::address(&doc));

        let [category, industries, sustainability] = Self::libraries(&doc);
        record.set("PRODUCT CATEGORY", category);
        record.set("INDUSTRIES", industries);
        record.set("SUSTAINABILITY INITIATIVE", sustainability);
        record.set("Official Website", Self::website(&doc));

        let [facebook, linkedin, instagram, youtube] = Self::social(&doc);
        record.set("Facebook handle", facebook);
        record.set("LinkedIn handle", linkedin);
        record.set("Instagram handle", instagram);
        record.set("YouTube handle", youtube);
        record
    }
}

static PARTNER_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"div[class="my-4 md:my-8 text-sm md:text-[16px] text-purple"]"#));
static PARTNER_HASHTAG: Lazy<Selector> =
    Lazy::new(|| selector(r#"div[class*="rounded-full"][class*="bg-gradient-main"]"#));
static PARTNER_BOOTH: Lazy<Selector> =
    Lazy::new(|| selector(r#"div[class="text-purple text-xs lg:text-base font-bold"]"#));
static PARTNER_BOOTH_NUMBER: Lazy<Selector> =
    Lazy::new(|| selector(r#"span[class="ml-1 uppercase"]"#));
static PARTNER_BOOTH_SCHEDULE: Lazy<Selector> = Lazy::new(|| selector(r#"span[class="ml-2"]"#));
static PARTNER_LOCATION: Lazy<Selector> =
    Lazy::new(|| selector(r#"div[class="mt-2 text-sm xl:text-md uppercase"]"#));
static PARTNER_INDUSTRY: Lazy<Selector> = Lazy::new(|| {
    selector(r#"span[class="flex-1 p-0 font-bold bg-gradient-main bg-clip-text text-transparent"]"#)
});
static SCRIPT: Lazy<Selector> = Lazy::new(|| selector("script"));

static SCRIPT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"creation|employees|city|development level|fundraising amount|looking_for|website")
        .unwrap()
});

/// `(column, key)` pairs read from the page's serialized script payload, where
/// strings appear as `\"key\":\"value\"`
static SCRIPT_FIELDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Creation", "creation"),
        ("Employees", "employees"),
        ("City", "city"),
        ("Fundraising Amount", "fundraising_amount"),
        ("Official Website", "website"),
        ("Development Level", "stage"),
        ("Type of Company(Startup or Not)", "type"),
        ("LinkedIN", "linkedin"),
        ("Instagram", "instagram"),
    ]
    .into_iter()
    .map(|(column, key)| {
        let pattern = format!(r#"\\"{key}\\":\\"(.*?)\\""#);
        (column, Regex::new(&pattern).unwrap())
    })
    .collect()
});

static LOOKING_FOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\n24:\[(.*?)\]").unwrap());

/// Partner pages that embed their company data in a serialized script payload
pub struct PartnerPageParser;

impl PartnerPageParser {
    pub const COLUMNS: &'static [&'static str] = &[
        "Company Name",
        "Company Event URL",
        "Location",
        "Company Description",
        "Booth Number",
        "Booth Schedule",
        "Creation",
        "Employees",
        "Industry Type",
        "City",
        "Fundraising Amount",
        "Official Website",
        "Development Level",
        "Looking For",
        "Type of Company(Startup or Not)",
        "HashTags",
        "LinkedIN",
        "Instagram",
    ];

    /// Last path segment of a partner URL, which doubles as its company name
    pub fn slug(url: &str) -> &str {
        url.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
    }

    /// Best-effort: the list position of this field in the payload is not
    /// stable, so a miss is expected and reads as empty.
    fn looking_for(script: &str) -> String {
        let Some(caps) = LOOKING_FOR.captures(script) else {
            return String::new();
        };
        caps[1]
            .replace('\\', "")
            .split("\",\"")
            .map(|s| s.trim_matches('"'))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn script_fields(doc: &Html, record: &mut FlatRecord) {
        let script = doc
            .select(&SCRIPT)
            .map(|s| s.text().collect::<String>())
            .find(|text| SCRIPT_MARKER.is_match(text));
        let Some(script) = script else {
            return;
        };
        for (column, regex) in SCRIPT_FIELDS.iter() {
            if let Some(caps) = regex.captures(&script) {
                record.set(*column, &caps[1]);
            }
        }
        record.set("Looking For", Self::looking_for(&script));
    }
}

impl PageParser for PartnerPageParser {
    fn columns(&self) -> &'static [&'static str] {
        Self::COLUMNS
    }

    fn parse(&self, url: &str, html: &str) -> FlatRecord {
        let doc = Html::parse_document(html);
        let text = |sel: &Selector| first_text(&doc, sel).unwrap_or_default();

        let mut record = FlatRecord::new();
        record.set("Company Name", Self::slug(url));
        record.set("Company Event URL", url);
        record.set("Company Description", text(&PARTNER_DESCRIPTION));
        record.set("Location", text(&PARTNER_LOCATION));
        record.set(
            "Industry Type",
            doc.select(&PARTNER_INDUSTRY)
                .next()
                .map(text_of)
                .unwrap_or_default(),
        );
        record.set(
            "HashTags",
            doc.select(&PARTNER_HASHTAG)
                .map(text_of)
                .collect::<Vec<_>>()
                .join(", "),
        );

        if let Some(booth) = doc.select(&PARTNER_BOOTH).next() {
            let number = booth.select(&PARTNER_BOOTH_NUMBER).next().map(text_of);
            let schedule = booth.select(&PARTNER_BOOTH_SCHEDULE).next().map(text_of);
            record.set("Booth Number", number.unwrap_or_default());
            record.set("Booth Schedule", schedule.unwrap_or_default());
        }

        Self::script_fields(&doc, &mut record);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = r#"
        <html><body>
          <a class="js-librarylink-entry" href="/outside">ignored</a>
          <div class="js-library-list-outer">
            <a class="js-librarylink-entry" href="/exhibitors/acme">Acme</a>
            <a class="js-librarylink-entry" href="/exhibitors/globex">Globex</a>
            <a class="js-librarylink-entry" href="/exhibitors/acme">Acme again</a>
            <a class="js-librarylink-entry">no href</a>
            <a class="other" href="/exhibitors/other">Other</a>
          </div>
        </body></html>"#;

    const EXHIBITOR: &str = r#"
        <html><body>
          <h1 class="m-exhibitor-entry__item__header__infos__title"> Acme Travel </h1>
          <div class="m-exhibitor-entry__item__header__infos__stand">Stand B12</div>
          <div class="m-exhibitor-entry__item__body__additional__item__value">Fast trips</div>
          <div class="m-exhibitor-entry__item__body__contacts__address">
            <h4>Address</h4> 1 Main Street<br>London<br>UK
          </div>
          <div class="m-exhibitor-entry__item__body__libraries">
            <div class="m-exhibitor-entry__item__body__libraries__library"><span>Hotels</span><span>Rail</span></div>
            <div class="m-exhibitor-entry__item__body__libraries__library"><span>Leisure</span></div>
          </div>
          <div class="m-exhibitor-entry__item__body__contacts__additional__button">
            <a href="https://acme.example">Visit</a>
          </div>
          <ul>
            <li class="m-exhibitor-entry__item__body__contacts__additional__social__item"><a href="https://www.linkedin.com/company/acme">in</a></li>
            <li class="m-exhibitor-entry__item__body__contacts__additional__social__item"><a href="https://youtube.com/acme">yt</a></li>
          </ul>
        </body></html>"#;

    #[test]
    fn entry_links_are_scoped_and_unique() {
        assert_eq!(
            collect_entry_links(DIRECTORY),
            vec!["/exhibitors/acme", "/exhibitors/globex"]
        );
        assert!(collect_entry_links("<html></html>").is_empty());
    }

    #[test]
    fn exhibitor_entry_fields() {
        let record = ExhibitorEntryParser.parse("https://show.example/exhibitors/acme", EXHIBITOR);
        assert_eq!(record.get("Company Name"), Some("Acme Travel"));
        assert_eq!(
            record.get("Company URL"),
            Some("https://show.example/exhibitors/acme")
        );
        assert_eq!(record.get("Stand"), Some("Stand B12"));
        assert_eq!(record.get("Company USP"), Some("Fast trips"));
        assert_eq!(record.get("Address"), Some("1 Main Street, London, UK"));
        assert_eq!(record.get("PRODUCT CATEGORY"), Some("Hotels, Rail"));
        assert_eq!(record.get("INDUSTRIES"), Some("Leisure"));
        assert_eq!(record.get("SUSTAINABILITY INITIATIVE"), Some("N/A"));
        assert_eq!(record.get("Official Website"), Some("https://acme.example"));
        assert_eq!(record.get("Facebook handle"), Some("N/A"));
        assert_eq!(
            record.get("LinkedIn handle"),
            Some("https://www.linkedin.com/company/acme")
        );
        assert_eq!(record.get("YouTube handle"), Some("https://youtube.com/acme"));
        assert!(ExhibitorEntryParser::COLUMNS
            .iter()
            .all(|c| record.get(c).is_some()));
    }

    #[test]
    fn exhibitor_defaults_on_unknown_markup() {
        let record = ExhibitorEntryParser.parse("u", "<html><body><p>moved</p></body></html>");
        for column in ExhibitorEntryParser::COLUMNS {
            if *column != "Company URL" {
                assert_eq!(record.get(column), Some("N/A"), "{column}");
            }
        }
    }

    #[test]
    fn exhibitor_website_fallback_by_link_text() {
        let html = r#"<a href="/about">About</a><a href="https://globex.example">Our Website</a>"#;
        let record = ExhibitorEntryParser.parse("u", html);
        assert_eq!(record.get("Official Website"), Some("https://globex.example"));
    }

    const PARTNER: &str = r#"
        <html><body>
          <div class="my-4 md:my-8 text-sm md:text-[16px] text-purple"> We build rockets. </div>
          <div class="mt-2 text-sm xl:text-md uppercase">Paris, France</div>
          <div class="text-purple text-xs lg:text-base font-bold">
            <span class="ml-1 uppercase">h4-12</span><span class="ml-2">Day 1-3</span>
          </div>
          <span class="flex-1 p-0 font-bold bg-gradient-main bg-clip-text text-transparent">
            Space
          </span>
          <div class="relative rounded-full bg-gradient-main h-5"> #space </div>
          <div class="relative rounded-full bg-gradient-main h-5">#ai</div>
          <script>var a = 1;</script>
          <script>self.__next_f.push([1,"{\"creation\":\"2015\",\"employees\":\"50-100\",\"city\":\"Paris\",\"stage\":\"Series A\",\"type\":\"startup\",\"website\":\"https://rocket.example\",\"linkedin\":\"https://linkedin.com/rocket\"}\n24:[\"Investors\",\"Clients\"]"])</script>
        </body></html>"#;

    #[test]
    fn partner_fields() {
        let url = "https://event.example/partners/rocket-co";
        let record = PartnerPageParser.parse(url, PARTNER);
        assert_eq!(record.get("Company Name"), Some("rocket-co"));
        assert_eq!(record.get("Company Event URL"), Some(url));
        assert_eq!(record.get("Company Description"), Some("We build rockets."));
        assert_eq!(record.get("Location"), Some("Paris, France"));
        assert_eq!(record.get("Booth Number"), Some("h4-12"));
        assert_eq!(record.get("Booth Schedule"), Some("Day 1-3"));
        assert_eq!(record.get("Industry Type"), Some("Space"));
        assert_eq!(record.get("HashTags"), Some("#space, #ai"));
        assert_eq!(record.get("Creation"), Some("2015"));
        assert_eq!(record.get("Employees"), Some("50-100"));
        assert_eq!(record.get("City"), Some("Paris"));
        assert_eq!(record.get("Development Level"), Some("Series A"));
        assert_eq!(record.get("Type of Company(Startup or Not)"), Some("startup"));
        assert_eq!(record.get("Official Website"), Some("https://rocket.example"));
        assert_eq!(record.get("LinkedIN"), Some("https://linkedin.com/rocket"));
        assert_eq!(record.get("Instagram"), None);
        assert_eq!(record.get("Fundraising Amount"), None);
        assert_eq!(record.get("Looking For"), Some("Investors, Clients"));
    }

    #[test]
    fn partner_without_script_payload() {
        let record = PartnerPageParser.parse("https://event.example/partners/x/", "<p></p>");
        assert_eq!(record.get("Company Name"), Some("x"));
        assert_eq!(record.get("Company Description"), Some(""));
        assert_eq!(record.get("Looking For"), None);
    }

    #[test]
    fn flat_record_is_tabular() {
        let mut record = FlatRecord::new();
        record.set("A", "1");
        assert_eq!(record.value("A"), Some("1"));
        assert_eq!(record.value("B"), None);
    }
}
