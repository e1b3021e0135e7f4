//! Property-based tests for dimension algebra and unit conversion.

use metron_units::{BaseDimension, Dimensions, Exponent, Unit, UnitRegistry};
use proptest::prelude::*;

fn exponent() -> impl Strategy<Value = Exponent> {
    (-6i64..=6, prop_oneof![Just(1i64), Just(2), Just(3)]).prop_map(|(n, d)| Exponent::new(n, d))
}

fn dimensions() -> impl Strategy<Value = Dimensions> {
    prop::collection::vec((0..BaseDimension::COUNT, exponent()), 0..6).prop_map(|pairs| {
        Dimensions::from_pairs(pairs.into_iter().map(|(i, exp)| (BaseDimension::ALL[i], exp)))
    })
}

proptest! {
    /// (a * b) / b = a
    #[test]
    fn prop_multiply_divide_round_trip(a in dimensions(), b in dimensions()) {
        let result = a.combine_multiply(&b).unwrap().combine_divide(&b).unwrap();
        prop_assert!(result.dimensionally_equal(&a));
        prop_assert_eq!(result, a);
    }

    /// a = a and a = a^1
    #[test]
    fn prop_equality_reflexive(a in dimensions()) {
        prop_assert!(a.dimensionally_equal(&a));
        prop_assert!(a.dimensionally_equal(&a.raise_power(Exponent::from_integer(1)).unwrap()));
    }

    /// Zero exponents never survive an operation
    #[test]
    fn prop_canonical_sparse_form(a in dimensions(), b in dimensions(), n in exponent()) {
        for result in [a.combine_multiply(&b), a.combine_divide(&b), a.raise_power(n)] {
            let result = result.unwrap();
            prop_assert!(result.iter().all(|(_, exp)| exp != Exponent::from_integer(0)));
        }
    }

    /// Comparison succeeds only for equal vectors
    #[test]
    fn prop_ordering_is_equal_or_error(a in dimensions(), b in dimensions()) {
        match a.try_compare(&b) {
            Ok(ordering) => {
                prop_assert_eq!(ordering, std::cmp::Ordering::Equal);
                prop_assert!(a.dimensionally_equal(&b));
            }
            Err(_) => prop_assert!(!a.dimensionally_equal(&b)),
        }
    }
}

const LENGTHS: &[&str] = &["m", "km", "ft", "in", "mile", "yd", "cm", "um"];
const PRESSURES: &[&str] = &["Pa", "kPa", "psi", "bar", "atm", "torr", "lbf ft^-2"];
const TEMPERATURES: &[&str] = &["K", "C", "F", "R"];

fn same_dimension_pair() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop_oneof![
        (prop::sample::select(LENGTHS), prop::sample::select(LENGTHS)),
        (prop::sample::select(PRESSURES), prop::sample::select(PRESSURES)),
        (prop::sample::select(TEMPERATURES), prop::sample::select(TEMPERATURES)),
    ]
}

proptest! {
    /// A -> B -> A reproduces the value
    #[test]
    fn prop_conversion_round_trip((a, b) in same_dimension_pair(), value in -1.0e6f64..1.0e6) {
        let registry = UnitRegistry::new().unwrap();
        let ua: Unit = registry.parse(a).unwrap();
        let ub: Unit = registry.parse(b).unwrap();

        let there = ua.convert_to(value, &ub).unwrap();
        let back = ub.convert_to(there, &ua).unwrap();
        prop_assert!(
            (back - value).abs() <= 1e-9 * value.abs().max(1.0),
            "{} {} -> {} -> {} {}", value, a, b, back, a
        );
    }
}
