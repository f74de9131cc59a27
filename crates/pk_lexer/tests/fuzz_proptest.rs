use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use pk_lexer::{Lexer, normalize_source};
use pk_syntax::TokenKind;

fn any_py_like() -> impl Strategy<Value = String> {
    let ascii =
        proptest::collection::vec(any::<char>().prop_filter("ascii", |c| c.is_ascii()), 0..40)
            .prop_map(|v| v.into_iter().collect::<String>());
    let unicode =
        proptest::collection::vec(any::<char>().prop_filter("non-ascii", |c| !c.is_ascii()), 0..20)
            .prop_map(|v| v.into_iter().collect::<String>());
    let sym = "def f(x):\n    return x\n f'{a!r:>3}' ''' \" ( [ { } ] ) \\\n 0x 1e+ 3j not in is not yield from # c\n\t"
        .to_string();
    (ascii, unicode, any::<bool>(), any::<bool>()).prop_map(move |(a, b, f1, f2)| {
        let mut s = String::new();
        if f1 {
            s.push_str(&sym);
        }
        s.push_str(&a);
        s.push_str(&b);
        if f2 {
            s.push_str(&sym);
        }
        s.chars().take(200).collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 16, max_shrink_iters: 200, .. ProptestConfig::default()
    })]
    #[ignore]
    #[test]
    fn lex_random_input_should_not_panic(s in any_py_like()) {
        let normalized = normalize_source(&s);
        // Errors are allowed; this only checks robustness (no panic) and stream shape.
        if let Ok(result) = Lexer::new("fuzz.py", &normalized).lex() {
            assert!(matches!(result.tokens.first().map(|t| t.kind), Some(TokenKind::Sof)));
            assert!(matches!(result.tokens.last().map(|t| t.kind), Some(TokenKind::Eof)));
        }
    }
}
