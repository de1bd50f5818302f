//! Built-in catalog of the Danish Gigaword (DAGW) sub-corpora.

use crate::CatalogEntry;

/// `(id, domain, extended name)` for every DAGW source, in catalog order.
const DAGW_SOURCES: [(&str, &str, &str); 24] = [
    ("retsinformationdk", "Legal", "retsinformation.dk (Danish legal information)"),
    ("skat", "Legal", "Skat (Danish tax authority)"),
    ("retspraksis", "Legal", "retspraksis (Danish legal information)"),
    ("hest", "Social Media", "Hestenettet (Danish debate forum)"),
    ("cc", "Web", "Common Crawl"),
    ("adl", "Wiki & Books", "Archive for Danish Literature"),
    ("botxt", "Other", "Bornholmsk (Danish dialect)"),
    ("danavis", "News", "Danish daily newspapers"),
    ("dannet", "dannet", "DanNet (Danish WordNet)"),
    ("depbank", "Other", "Danish Dependency Treebank"),
    ("ep", "Conversation", "European Parliament"),
    ("ft", "Conversation", "Folketinget (Danish Parliament)"),
    ("gutenberg", "Wiki & Books", "Gutenberg"),
    ("jvj", "Wiki & Books", "Johannes V. Jensen (Danish poet)"),
    ("naat", "Conversation", "NAAT"),
    ("opensub", "Conversation", "Open Subtitles"),
    ("relig", "Wiki & Books", "Religious texts"),
    ("spont", "Conversation", "Spontaneous speech"),
    ("synne", "Other", "Synderjysk (Danish dialect)"),
    ("tv2r", "News", "TV 2 Radio (Danish news)"),
    ("wiki", "Wiki & Books", "Wikipedia"),
    ("wikibooks", "Wiki & Books", "Wikibooks"),
    ("wikisource", "Wiki & Books", "Wikisource"),
    ("twfv19", "Social Media", "Twitter Folketingsvalget 2019 (Danish election tweets)"),
];

pub(crate) fn entries() -> Vec<CatalogEntry> {
    DAGW_SOURCES
        .iter()
        .map(|(id, domain, extended_name)| CatalogEntry {
            id: (*id).to_string(),
            domain: (*domain).to_string(),
            extended_name: (*extended_name).to_string(),
        })
        .collect()
}
