/// Implements arithmetic operators on a single-field tuple struct by delegating to the inner value.
///
/// ```ignore
/// newtype_ops!(Cents; binary Add::add, Sub::sub; assign AddAssign::add_assign; unary Neg::neg);
/// ```
#[macro_export]
macro_rules! newtype_ops {
    (
        $t:ident;
        binary $($bin_trait:ident::$bin_fn:ident),*;
        assign $($asg_trait:ident::$asg_fn:ident),*;
        unary $($un_trait:ident::$un_fn:ident),*
    ) => {
        $(
            impl std::ops::$bin_trait for $t {
                type Output = Self;

                fn $bin_fn(self, rhs: Self) -> Self::Output {
                    Self(std::ops::$bin_trait::$bin_fn(self.0, rhs.0))
                }
            }
        )*
        $(
            impl std::ops::$asg_trait for $t {
                fn $asg_fn(&mut self, rhs: Self) {
                    std::ops::$asg_trait::$asg_fn(&mut self.0, rhs.0)
                }
            }
        )*
        $(
            impl std::ops::$un_trait for $t {
                type Output = Self;

                fn $un_fn(self) -> Self::Output {
                    Self(std::ops::$un_trait::$un_fn(self.0))
                }
            }
        )*
    };
}
