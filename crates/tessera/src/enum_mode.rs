/// Define an enum with string representations and an optional default variant.
macro_rules! enum_mode {
    (
        $(#[$meta:meta])* $vis:vis $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $str:expr, )+
        }
        default $default:ident
    ) => {
        enum_mode! {
            $(#[$meta])* $vis $name {
                $( $(#[$vmeta])* $variant => $str, )+
            }
        }

        impl Default for $name {
            fn default() -> Self { Self::$default }
        }
    };

    (
        $(#[$meta:meta])* $vis:vis $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $str:expr, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
