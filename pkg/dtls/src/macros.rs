#[macro_export]
macro_rules! dtls_enum_u8 {
    ($name:ident => { $( $case:ident ( $val:expr ) ),* , (255) }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum $name {
            $(
                $case,
            )*
            unknown(u8)
        }

        impl $name {
            pub fn to_u8(&self) -> u8 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::unknown(v) => *v
                }
            }

            pub fn from_u8(v: u8) -> Self {
                match v {
                    $(
                        $val => $name::$case,
                    )*
                    _ => $name::unknown(v)
                }
            }

            pub fn parse(c: &mut $crate::parsing::Cursor) -> $crate::error::Result<Self> {
                Ok(Self::from_u8(c.next_u8()?))
            }

            pub fn serialize(&self, out: &mut Vec<u8>) {
                out.push(self.to_u8());
            }
        }
    };
}

#[macro_export]
macro_rules! dtls_enum_u16 {
    ($(#[$meta:meta])* $name:ident => { $( $case:ident = $val:expr ),* , (65535) }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum $name {
            $(
                $case,
            )*
            unknown(u16)
        }

        impl $name {
            pub fn to_u16(&self) -> u16 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::unknown(v) => *v
                }
            }

            pub fn from_u16(v: u16) -> Self {
                match v {
                    $(
                        $val => $name::$case,
                    )*
                    _ => $name::unknown(v)
                }
            }

            pub fn parse(c: &mut $crate::parsing::Cursor) -> $crate::error::Result<Self> {
                Ok(Self::from_u16(c.next_u16()?))
            }

            pub fn serialize(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_u16().to_be_bytes());
            }
        }
    };
}

#[macro_export]
macro_rules! dtls_struct {
    ($name:ident => { $( $typ:ident $field:ident );* ; }) => {
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            $(
                pub $field: $typ,
            )*
        }

        impl $name {
            pub fn parse(c: &mut $crate::parsing::Cursor) -> $crate::error::Result<Self> {
                $(
                    let $field = $typ::parse(c)?;
                )*

                Ok(Self { $( $field, )* })
            }

            pub fn serialize(&self, out: &mut Vec<u8>) {
                $(
                    self.$field.serialize(out);
                )*
            }
        }
    };
}
