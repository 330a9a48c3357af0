use rand::Rng;

use crate::db_types::OrderNumber;

const ORDER_NUMBER_PREFIX: &str = "CPG";
const ORDER_NUMBER_LEN: usize = 6;

/// Generates a human-readable order number for sessions that did not carry one. Uniqueness is enforced by the
/// orders table, not here; a collision simply surfaces as a (vanishingly rare) conflicting insert.
pub fn generate_order_number() -> OrderNumber {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
    let mut rng = rand::thread_rng();
    let suffix: String =
        (0..ORDER_NUMBER_LEN).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    OrderNumber(format!("{ORDER_NUMBER_PREFIX}-{suffix}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_numbers_have_the_expected_shape() {
        let n = generate_order_number();
        assert!(n.as_str().starts_with("CPG-"));
        assert_eq!(n.as_str().len(), 4 + ORDER_NUMBER_LEN);
    }
}
