//! Property tests for the fundamental types.

use proptest::prelude::*;
use strand_types::{Account, Amount, BlockHash, PendingKey, QualifiedRoot, Root};

proptest! {
    #[test]
    fn account_hex_round_trip(bytes in proptest::array::uniform32(any::<u8>())) {
        let account = Account::new(bytes);
        let encoded = account.encode_hex();
        prop_assert_eq!(Account::decode_hex(&encoded).unwrap(), account);
    }

    #[test]
    fn amount_be_bytes_round_trip(value in any::<u128>()) {
        let amount = Amount::raw(value);
        prop_assert_eq!(Amount::from_be_bytes(amount.to_be_bytes()), amount);
    }

    #[test]
    fn amount_be_bytes_preserve_ordering(a in any::<u128>(), b in any::<u128>()) {
        let (x, y) = (Amount::raw(a), Amount::raw(b));
        prop_assert_eq!(x.to_be_bytes().cmp(&y.to_be_bytes()), a.cmp(&b));
    }

    #[test]
    fn pending_key_round_trip(
        account in proptest::array::uniform32(any::<u8>()),
        hash in proptest::array::uniform32(any::<u8>()),
    ) {
        let key = PendingKey::new(Account::new(account), BlockHash::new(hash));
        prop_assert_eq!(PendingKey::from_bytes(&key.to_bytes()), key);
    }

    #[test]
    fn qualified_root_round_trip(
        root in proptest::array::uniform32(any::<u8>()),
        previous in proptest::array::uniform32(any::<u8>()),
    ) {
        let qr = QualifiedRoot::new(Root::new(root), BlockHash::new(previous));
        prop_assert_eq!(QualifiedRoot::from_bytes(&qr.to_bytes()), qr);
    }

    #[test]
    fn amount_serde_round_trip(value in any::<u128>()) {
        let amount = Amount::raw(value);
        let bytes = bincode::serialize(&amount).unwrap();
        prop_assert_eq!(bincode::deserialize::<Amount>(&bytes).unwrap(), amount);
    }
}
