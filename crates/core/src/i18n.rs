//! Minimal message catalogue for text rendered into ticket documents.
//!
//! Lookups fall back from a regional locale (`de-AT`, `de_formal`) to its
//! language and finally to the English message id itself.

const DE: &[(&str, &str)] = &[
    ("Sample product", "Beispielprodukt"),
    ("Sample product description", "Beispielbeschreibung"),
    ("Sample workshop", "Beispiel-Workshop"),
    ("Sample company", "Beispielfirma"),
    ("Ticket", "Ticket"),
    ("Order", "Bestellung"),
    ("Position", "Position"),
    ("Product", "Produkt"),
    ("Attendee", "Teilnehmer"),
    ("Price", "Preis"),
    ("Add-ons", "Zusatzprodukte"),
    ("Tickets", "Tickets"),
];

const NL: &[(&str, &str)] = &[
    ("Sample product", "Voorbeeldproduct"),
    ("Sample product description", "Voorbeeldomschrijving"),
    ("Sample workshop", "Voorbeeldworkshop"),
    ("Sample company", "Voorbeeldbedrijf"),
    ("Order", "Bestelling"),
    ("Product", "Product"),
    ("Attendee", "Deelnemer"),
    ("Price", "Prijs"),
];

fn catalogue(language: &str) -> Option<&'static [(&'static str, &'static str)]> {
    match language {
        "de" => Some(DE),
        "nl" => Some(NL),
        _ => None,
    }
}

/// Translate `msgid` into `locale`.
pub fn gettext(locale: &str, msgid: &'static str) -> &'static str {
    let language = locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase();

    catalogue(&language)
        .and_then(|entries| entries.iter().find(|(id, _)| *id == msgid))
        .map(|(_, translated)| *translated)
        .unwrap_or(msgid)
}
