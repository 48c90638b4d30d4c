use proptest::prelude::*;
use shelf_storage::{CastId, resolve_lexical};
use std::path::Path;

proptest! {
    #[test]
    fn token_round_trips(
        owner in "[A-Za-z0-9_:-]{1,32}",
        date in "[0-9]{8}",
        suffix in "[a-z]{8}",
    ) {
        let id = CastId::new(owner, date, suffix);
        let token = id.encode();
        prop_assert!(token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        prop_assert_eq!(CastId::decode(&token).unwrap(), id);
    }

    #[test]
    fn decode_never_panics(token in "\\PC{0,64}") {
        let _ = CastId::decode(&token);
    }

    #[test]
    fn resolved_paths_stay_under_root(segments in prop::collection::vec("(\\.\\.|\\.|[a-z]{1,4})", 1..8)) {
        let root = Path::new("/srv/casts");
        let rel = segments.join("/");
        if let Ok(resolved) = resolve_lexical(root, &rel) {
            prop_assert!(resolved.starts_with(root));
            prop_assert_ne!(resolved.as_path(), root);
        }
    }
}
