use spurge::types::ItemKind;
use spurge::utils::*;

#[test]
fn test_generate_code_verifier_length_and_charset() {
    let verifier = generate_code_verifier();
    assert_eq!(verifier.len(), 128);
    assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn test_generate_code_verifier_is_random() {
    assert_ne!(generate_code_verifier(), generate_code_verifier());
}

#[test]
fn test_generate_code_challenge_known_value() {
    // RFC 7636 appendix B
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    assert_eq!(
        generate_code_challenge(verifier),
        "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
    );
}

#[test]
fn test_parse_pasted_items_mixed_kinds() {
    let items = parse_pasted_items("Artist One\nLabel: Example Records\nartist: another artist");

    assert_eq!(items.len(), 3);
    let labels: Vec<_> = items.iter().filter(|i| i.kind == ItemKind::Label).collect();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].name, "Example Records");
    assert_eq!(items[2].name, "another artist");
}

#[test]
fn test_parse_pasted_items_dedupes_case_insensitively() {
    let items = parse_pasted_items("Artist One\nartist: Artist One\nARTIST: artist one");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ItemKind::Artist);
    assert_eq!(items[0].name, "Artist One");
}

#[test]
fn test_parse_pasted_items_same_name_different_kinds() {
    let items = parse_pasted_items("Motown\nlabel: Motown");
    assert_eq!(items.len(), 2);
}

#[test]
fn test_parse_pasted_items_skips_blank_and_comments() {
    let items = parse_pasted_items("\n# my list\n   \nArtist Two\n");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Artist Two");
}

#[test]
fn test_parse_pasted_items_external_ids() {
    let items = parse_pasted_items(
        "Artist One | spotify:artist:0OdUWJ0sBjDrqHygGUXeCF\n\
         Artist Two | https://open.spotify.com/artist/4Z8W4fKeB5YxbusRsdQVPb?si=abc\n\
         Artist Three | not an id",
    );

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].external_id.as_deref(), Some("0OdUWJ0sBjDrqHygGUXeCF"));
    assert_eq!(items[1].external_id.as_deref(), Some("4Z8W4fKeB5YxbusRsdQVPb"));
    assert_eq!(items[2].external_id, None);
    assert_eq!(items[2].name, "Artist Three | not an id");
}

#[test]
fn test_parse_pasted_items_keeps_pipe_in_names() {
    let items = parse_pasted_items(
        "Tyler | The Creator
         A | B | spotify:artist:abc123",
    );

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "Tyler | The Creator");
    assert_eq!(items[0].external_id, None);
    assert_eq!(items[1].name, "A | B");
    assert_eq!(items[1].external_id.as_deref(), Some("abc123"));
}
