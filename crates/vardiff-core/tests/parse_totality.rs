//! Balanced input always parses into a consistent tree.
#![allow(clippy::expect_used)]

mod common;

use common::{arb_blocks, node_count, render};
use proptest::prelude::*;
use vardiff_core::{DiffTreeSource, ParseError, Side, parse_patch};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn balanced_patches_parse(blocks in arb_blocks()) {
        let text = render(&blocks);
        let tree = parse_patch(&text, DiffTreeSource::new("gen.c", "c0"))
            .expect("balanced input parses");
        prop_assert!(tree.check_consistency().is_ok());
        prop_assert_eq!(tree.len(), node_count(&blocks) + 1);
        for side in Side::ALL {
            let root = tree.root().expect("root");
            prop_assert_eq!(tree.roots(side), vec![root]);
        }
    }

    #[test]
    fn dropping_the_last_endif_is_detected(blocks in arb_blocks()) {
        let text = render(&blocks);
        let Some(pos) = text.rfind("#endif\n") else {
            return Ok(());
        };
        // Remove the whole line holding the last `#endif`.
        let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
        let truncated = format!("{}{}", &text[..line_start], &text[pos + "#endif\n".len()..]);
        let err = parse_patch(&truncated, DiffTreeSource::default())
            .expect_err("unbalanced input fails");
        prop_assert!(matches!(err, ParseError::UnclosedConditional { .. }), "{err:?}");
    }
}
