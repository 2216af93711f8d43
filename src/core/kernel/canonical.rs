use crate::core::types::Params;

/// Render parameters as the exact string that gets signed.
///
/// Keys are sorted by byte order and joined as `key=value` pairs with `&`.
/// List values render as `["a","b"]`, everything else with its plain
/// scalar formatting.
pub fn canonicalize(params: &Params) -> String {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort_unstable();

    keys.into_iter()
        .map(|k| format!("{}={}", k, params[k]))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ParamValue;

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_sorted_keys() {
        let p = params(&[
            ("symbol", "BTCUSDT".into()),
            ("side", "BUY".into()),
            ("timestamp", 1_700_000_000_000_u64.into()),
        ]);
        assert_eq!(
            canonicalize(&p),
            "side=BUY&symbol=BTCUSDT&timestamp=1700000000000"
        );
    }

    #[test]
    fn test_list_values() {
        let p = params(&[
            ("symbols", vec!["BTCUSDT", "BNBUSDT"].into()),
            ("apiKey", "k".into()),
        ]);
        assert_eq!(canonicalize(&p), r#"apiKey=k&symbols=["BTCUSDT","BNBUSDT"]"#);
    }

    #[test]
    fn test_byte_order_puts_uppercase_first() {
        let p = params(&[("b", 1_i64.into()), ("B", 2_i64.into()), ("a", 3_i64.into())]);
        assert_eq!(canonicalize(&p), "B=2&a=3&b=1");
    }

    #[test]
    fn test_empty() {
        assert_eq!(canonicalize(&Params::new()), "");
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let keys = ["quantity", "price", "type", "symbol", "side", "timeInForce"];
        let forward: Params = keys
            .iter()
            .map(|k| ((*k).to_string(), ParamValue::from(*k)))
            .collect();
        let reverse: Params = keys
            .iter()
            .rev()
            .map(|k| ((*k).to_string(), ParamValue::from(*k)))
            .collect();

        let expected = canonicalize(&forward);
        for _ in 0..16 {
            assert_eq!(canonicalize(&forward), expected);
            assert_eq!(canonicalize(&reverse), expected);
        }
    }
}
