//! Property-based tests for tax splits, GSTIN parsing and liability netting.
//!
//! Run with: `cargo test --test proptest_tests`

use bigdecimal::BigDecimal;
use gst_core::tax::gstin;
use gst_core::utils::{percent_of, round_money};
use gst_core::{calculate, reverse_charge, TaxComponents};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────────

/// Taxable amount in paise (0.00 to 9999999.99)
fn arb_amount() -> impl Strategy<Value = BigDecimal> {
    (0i64..1_000_000_000i64).prop_map(|paise| BigDecimal::new(paise.into(), 2))
}

/// Rate between 0 and 28 in steps of 0.25
fn arb_rate() -> impl Strategy<Value = BigDecimal> {
    (0i64..=112i64).prop_map(|quarters| BigDecimal::new(quarters.into(), 0) / BigDecimal::from(4))
}

fn arb_components() -> impl Strategy<Value = TaxComponents> {
    (arb_amount(), arb_amount(), arb_amount())
        .prop_map(|(igst, cgst, sgst)| TaxComponents::new(igst, cgst, sgst))
}

fn arb_gstin() -> impl Strategy<Value = String> {
    "[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]"
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn intra_state_split_is_even(amount in arb_amount(), rate in arb_rate()) {
        let split = calculate(&amount, &rate, false);
        let half = &amount * &rate / BigDecimal::from(200);

        prop_assert_eq!(&split.cgst, &split.sgst);
        prop_assert_eq!(&split.cgst, &half);
        prop_assert_eq!(&split.cgst + &split.sgst, percent_of(&amount, &rate));
        prop_assert_eq!(split.igst, BigDecimal::from(0));
    }

    #[test]
    fn inter_state_split_is_all_igst(amount in arb_amount(), rate in arb_rate()) {
        let split = calculate(&amount, &rate, true);

        prop_assert_eq!(&split.igst, &(&amount * &rate / BigDecimal::from(100)));
        prop_assert_eq!(split.cgst, BigDecimal::from(0));
        prop_assert_eq!(split.sgst, BigDecimal::from(0));
        prop_assert_eq!(split.total, split.igst);
    }

    #[test]
    fn split_total_does_not_depend_on_supply_type(amount in arb_amount(), rate in arb_rate()) {
        let intra = calculate(&amount, &rate, false);
        let inter = calculate(&amount, &rate, true);

        prop_assert_eq!(intra.total, inter.total);
    }

    #[test]
    fn reverse_charge_adds_tax_to_value(amount in arb_amount(), rate in arb_rate()) {
        let charge = reverse_charge(&amount, &rate);

        prop_assert_eq!(&charge.total_amount, &(&amount + &charge.gst_amount));
        prop_assert!(charge.gst_amount >= BigDecimal::from(0));
    }

    #[test]
    fn liability_is_never_negative(outward in arb_components(), credit in arb_components()) {
        let liability = outward.liability_after(&credit);
        let zero = BigDecimal::from(0);

        prop_assert!(liability.igst >= zero);
        prop_assert!(liability.cgst >= zero);
        prop_assert!(liability.sgst >= zero);
        prop_assert!(liability.total() <= outward.total());
    }

    #[test]
    fn well_formed_gstins_validate(value in arb_gstin()) {
        prop_assert!(gstin::validate_format(&value));
        prop_assert_eq!(gstin::state_code(&value), Some(&value[..2]));
        prop_assert!(!gstin::validate_format(&value.to_lowercase()));
        prop_assert!(!gstin::validate_format(&value[..14]));
    }

    #[test]
    fn same_state_prefix_is_never_inter_state(a in arb_gstin(), b in arb_gstin()) {
        let buyer = format!("{}{}", &a[..2], &b[2..]);

        prop_assert!(!gstin::is_inter_state(Some(&a), Some(&buyer)));
        prop_assert_eq!(gstin::is_inter_state(Some(&a), Some(&b)), a[..2] != b[..2]);
    }

    #[test]
    fn rounding_is_within_half_a_paisa(amount in arb_amount(), rate in arb_rate()) {
        let tax = percent_of(&amount, &rate);
        let rounded = round_money(&tax, 2);
        let diff = (&rounded - &tax).abs();

        prop_assert!(diff <= BigDecimal::new(5.into(), 3));
    }
}
