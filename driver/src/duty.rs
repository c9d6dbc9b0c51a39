/// Maps a normalized duty cycle to a timer compare value in `[0, top]`.
///
/// `round(|duty| × top)`. The sign is dropped because drive direction is
/// carried by the commutation step. Out-of-range input saturates and NaN
/// yields zero: this runs in the commutation interrupt where failing is not
/// an option.
pub fn duty_to_compare(duty: f32, top: u16) -> u16 {
    let magnitude = if duty < 0.0 { -duty } else { duty };
    if magnitude.is_nan() || magnitude <= 0.0 {
        return 0;
    }
    if magnitude >= 1.0 {
        return top;
    }
    let compare = magnitude * f32::from(top) + 0.5;
    (compare as u16).min(top)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP: u16 = 6799;

    #[test]
    fn half_duty_rounds_to_nearest() {
        assert_eq!(duty_to_compare(0.5, TOP), 3400);
        assert_eq!(duty_to_compare(0.5, 8499), 4250);
    }

    #[test]
    fn sign_is_ignored() {
        for i in 0..=200 {
            let duty = i as f32 / 200.0;
            assert_eq!(duty_to_compare(duty, TOP), duty_to_compare(-duty, TOP));
        }
    }

    #[test]
    fn monotonic_and_bounded() {
        let mut previous = 0;
        for i in 0..=1000 {
            let compare = duty_to_compare(i as f32 / 1000.0, TOP);
            assert!(compare >= previous);
            assert!(compare <= TOP);
            previous = compare;
        }
        assert_eq!(previous, TOP);
    }

    #[test]
    fn out_of_range_saturates() {
        assert_eq!(duty_to_compare(1.7, TOP), TOP);
        assert_eq!(duty_to_compare(-42.0, TOP), TOP);
        assert_eq!(duty_to_compare(f32::INFINITY, TOP), TOP);
        assert_eq!(duty_to_compare(f32::NEG_INFINITY, TOP), TOP);
    }

    #[test]
    fn nan_and_zero_map_to_zero() {
        assert_eq!(duty_to_compare(f32::NAN, TOP), 0);
        assert_eq!(duty_to_compare(0.0, TOP), 0);
        assert_eq!(duty_to_compare(-0.0, TOP), 0);
        assert_eq!(duty_to_compare(0.9, 0), 0);
    }
}
