use super::*;

fn record(name: &str, address: &str) -> CandidateRecord {
    CandidateRecord {
        name: name.to_string(),
        address: address.to_string(),
        source_name: "photobooth_net".to_string(),
        source_url: "https://photobooth.net/locations/".to_string(),
        ..CandidateRecord::default()
    }
}

#[test]
fn record_without_address_is_invalid() {
    assert!(!record("Musée Mécanique", "  ").is_valid());
    assert!(!record("", "Pier 45").is_valid());
    assert!(record("Musée Mécanique", "Pier 45").is_valid());
}

#[test]
fn sanitized_trims_and_drops_blank_optionals() {
    let mut r = record("  Musée   Mécanique ", " Pier 45,  Fisherman's Wharf ");
    r.city = Some("   ".to_string());
    r.cost = Some(" $5.00 ".to_string());
    r.description = Some("\n".to_string());
    let r = r.sanitized().expect("valid after sanitation");
    assert_eq!(r.name, "Musée Mécanique");
    assert_eq!(r.address, "Pier 45, Fisherman's Wharf");
    assert!(r.city.is_none());
    assert_eq!(r.cost.as_deref(), Some("$5.00"));
    assert!(r.description.is_none());
}

#[test]
fn sanitized_rejects_records_missing_required_fields() {
    assert!(record("Booth", "").sanitized().is_none());
}

#[test]
fn sanitized_filters_and_dedupes_photos() {
    let mut r = record("Booth", "1 Main St");
    r.photos = vec![
        "https://img.example/a.jpg".to_string(),
        "javascript:alert(1)".to_string(),
        " https://img.example/a.jpg ".to_string(),
        "http://img.example/b.jpg".to_string(),
    ];
    let r = r.sanitized().unwrap();
    assert_eq!(
        r.photos,
        vec![
            "https://img.example/a.jpg".to_string(),
            "http://img.example/b.jpg".to_string()
        ]
    );
}

#[test]
fn sanitized_drops_null_island_coordinates() {
    let mut r = record("Booth", "1 Main St");
    r.latitude = Some(0.0);
    r.longitude = Some(0.0);
    let r = r.sanitized().unwrap();
    assert!(r.coordinates().is_none());
}

#[test]
fn booth_key_ignores_cosmetic_differences() {
    let mut a = record("Joe's Bar & Grill", "123 Main St.");
    a.city = Some("Springfield".to_string());
    a.country = Some("USA".to_string());
    let mut b = record("joes bar and grill", "123 main st");
    b.city = Some("SPRINGFIELD".to_string());
    b.country = Some("United States".to_string());
    assert_eq!(a.booth_key(), b.booth_key());
    assert_eq!(a.booth_key().len(), 64);
}

#[test]
fn booth_key_differs_by_city() {
    let mut a = record("Photobooth", "1 Main St");
    a.city = Some("Portland".to_string());
    let mut b = a.clone();
    b.city = Some("Seattle".to_string());
    assert_ne!(a.booth_key(), b.booth_key());
}

#[test]
fn canonical_country_maps_aliases() {
    assert_eq!(canonical_country("U.S.A.").as_deref(), Some("US"));
    assert_eq!(canonical_country("United Kingdom").as_deref(), Some("GB"));
    assert_eq!(canonical_country("Deutschland").as_deref(), Some("DE"));
    assert_eq!(canonical_country("  ").as_deref(), None);
    assert_eq!(canonical_country("Narnia").as_deref(), Some("narnia"));
}

#[test]
fn booth_status_parses_synonyms() {
    assert_eq!("Operational".parse::<BoothStatus>(), Ok(BoothStatus::Active));
    assert_eq!("removed".parse::<BoothStatus>(), Ok(BoothStatus::Closed));
    assert!("sideways".parse::<BoothStatus>().is_err());
}

#[test]
fn record_deserializes_with_missing_optional_fields() {
    let r: CandidateRecord = serde_json::from_str(
        r#"{"name": "Booth", "address": "1 Main St", "status": "active", "photos": []}"#,
    )
    .unwrap();
    assert_eq!(r.status, Some(BoothStatus::Active));
    assert!(r.city.is_none());
    assert!(r.source_name.is_empty());
}
