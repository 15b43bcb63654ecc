use std::cmp::Ordering;

use alloy::primitives::U256;
use fastnum::{
    UD128, UD256, bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};

/// Decimals of the common fixed-point base all comparisons happen in.
pub const WEI_DECIMALS: u8 = 18;

/// Fixed-point to decimal converter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    /// Converter for the common 18-decimal base.
    pub fn wei() -> Self {
        Self::new(WEI_DECIMALS)
    }

    pub fn decimals(&self) -> u8 {
        self.decimals as u8
    }

    pub fn from_unsigned<const N: usize>(&self, value: U256) -> UnsignedDecimal<N> {
        let unscaled = bint::UInt::<N>::from_le_slice(value.as_le_slice())
            .expect("Converter: U256 -> UInt::<N>");
        UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        )
    }

    pub fn to_unsigned<const N: usize>(&self, value: UnsignedDecimal<N>) -> U256 {
        let rescaled = value.rescale(self.decimals as i16);
        U256::from_le_slice(rescaled.digits().to_radix_le(256).as_slice())
    }

    /// Rescales a token-native amount into the 18-decimal base.
    ///
    /// Tokens with more than 18 decimals lose the excess precision (floor).
    pub fn to_wei(&self, value: U256) -> U256 {
        let wei = WEI_DECIMALS as i32;
        match self.decimals.cmp(&wei) {
            Ordering::Less => value.saturating_mul(pow10(wei - self.decimals)),
            Ordering::Greater => value / pow10(self.decimals - wei),
            Ordering::Equal => value,
        }
    }
}

/// Multiplies an 18-decimal amount by a rational factor, rescaling the
/// product back into the 18-decimal base.
pub fn scale(wei: U256, factor: UD128) -> U256 {
    let conv = Converter::wei();
    let amount: UD256 = conv.from_unsigned(wei);
    let factor: UD256 = factor.resize();
    conv.to_unsigned(amount * factor)
}

fn pow10(exp: i32) -> U256 {
    U256::from(10u64).pow(U256::from(exp as u64))
}

#[cfg(test)]
mod tests {
    use fastnum::{udec128, udec256};

    use super::*;

    fn wei(units: u64) -> U256 {
        U256::from(units) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn test_collateral_amounts_to_decimal() {
        // 250.5 USDC
        assert_eq!(
            Converter::new(6).from_unsigned::<4>(U256::from(250_500_000u64)),
            udec256!(250.5)
        );
        assert_eq!(Converter::wei().from_unsigned::<4>(wei(42)), udec256!(42));
        assert_eq!(
            Converter::new(8).from_unsigned::<4>(U256::from(1u64)),
            udec256!(0.00000001)
        );
    }

    #[test]
    fn test_decimal_to_native_amounts() {
        assert_eq!(
            Converter::new(6).to_unsigned(udec256!(250.5)),
            U256::from(250_500_000u64)
        );
        assert_eq!(Converter::wei().to_unsigned(udec256!(42)), wei(42));
        assert_eq!(Converter::new(0).to_unsigned(udec256!(17)), U256::from(17u64));
    }

    #[test]
    fn test_to_wei_rescales_native_amounts() {
        assert_eq!(Converter::new(6).to_wei(U256::from(120_000_000u64)), wei(120));
        assert_eq!(Converter::new(18).to_wei(wei(7)), wei(7));
        assert_eq!(
            Converter::new(20).to_wei(U256::from(12_345u64)),
            U256::from(123u64)
        );
        assert_eq!(Converter::new(0).to_wei(U256::from(3u64)), wei(3));
    }

    #[test]
    fn test_scale_by_fraction() {
        // 100 tokens at 1.20 with 1% slippage against the user
        assert_eq!(
            scale(wei(100), udec128!(1.188)),
            U256::from(118_800_000_000_000_000_000u128)
        );
        assert_eq!(scale(wei(5), UD128::ONE), wei(5));
        assert_eq!(scale(wei(5), UD128::ZERO), U256::ZERO);
    }
}
