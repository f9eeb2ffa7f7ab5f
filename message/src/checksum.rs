pub type Array = smallvec::SmallVec<[u8; 8]>;

pub trait Checksum {
    type Output: num_traits::PrimInt;

    fn checksum(vals: &[u8]) -> Self::Output;
    fn checksum_array(vals: &[u8]) -> Array;
}

#[inline]
pub const fn size<T>() -> usize
where
    T: Checksum,
{
    std::mem::size_of::<T::Output>()
}

/// Declare a zero-sized [`Checksum`] over a `crc` algorithm, written big-endian.
///
/// The `reflected` form bit-reverses the finished register before it is written out, which is
/// how AX.25 stations transmit the FCS.
#[macro_export]
macro_rules! impl_checksum {
    (@impl $vis:vis $name:ident, $ty:ident, $algo:expr, $finish:expr) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        $vis struct $name;

        impl $crate::checksum::Checksum for $name {
            type Output = $ty;

            #[inline]
            fn checksum(vals: &[u8]) -> Self::Output {
                const CRC: ::crc::Crc<$ty> = ::crc::Crc::<$ty>::new(&$algo);

                ($finish)(CRC.checksum(vals))
            }

            fn checksum_array(vals: &[u8]) -> $crate::checksum::Array {
                ::paste::paste! {
                    let mut ret = ::smallvec::smallvec![0u8; ::std::mem::size_of::<$ty>()];

                    <::byteorder::BE as ::byteorder::ByteOrder>::[< write_ $ty >](&mut ret[..], Self::checksum(vals));
                    ret
                }
            }
        }
    };

    ($vis:vis $name:ident, $ty:ident, $algo:expr) => {
        $crate::impl_checksum!(@impl $vis $name, $ty, $algo, |v: $ty| v);
    };

    ($vis:vis $name:ident, $ty:ident, $algo:expr, reflected) => {
        $crate::impl_checksum!(@impl $vis $name, $ty, $algo, |v: $ty| v.reverse_bits());
    };
}
