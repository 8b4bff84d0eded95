/// Declares a record type together with its codec implementations.
///
/// Each field is listed with its wire name; fields are encoded in the order
/// they are declared and every field is always written. On decode a nil
/// value yields `Default::default()` and unknown field names are handed to
/// [`Decoder::skip_field`](crate::codec::Decoder::skip_field).
///
/// ```ignore
/// record! {
///     /// A message to be published
///     pub struct PubMessage {
///         subject: String => "subject",
///         reply_to: String => "replyTo",
///         body: Bytes => "body",
///     }
/// }
/// ```
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                #[serde(rename = $wire)]
                pub $field: $ty,
            )+
        }

        impl $name {
            /// Wire names of the fields, in encoding order.
            pub const FIELDS: &'static [&'static str] = &[$($wire),+];
        }

        impl $crate::codec::Encode for $name {
            fn encode<W: $crate::codec::Writer>(
                &self,
                w: &mut W,
            ) -> Result<(), $crate::codec::CodecError> {
                w.write_map_size(Self::FIELDS.len() as u32)?;
                $(
                    w.write_string($wire)?;
                    $crate::codec::Field::write_field(&self.$field, w)?;
                )+
                Ok(())
            }
        }

        impl $crate::codec::Decode for $name {
            fn decode(
                d: &mut $crate::codec::Decoder<'_>,
            ) -> Result<Self, $crate::codec::CodecError> {
                let mut val = Self::default();
                if d.is_next_nil()? {
                    d.read_nil()?;
                    return Ok(val);
                }
                let size = d.read_map_size()?;
                for _ in 0..size {
                    match d.read_str()? {
                        $( $wire => val.$field = $crate::codec::Field::read_field(d)?, )+
                        other => d.skip_field(other)?,
                    }
                }
                Ok(val)
            }
        }
    };
}
