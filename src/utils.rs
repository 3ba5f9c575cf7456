use serde::de::DeserializeOwned;

use crate::Result;

pub fn read_data_from_yaml<T>(path: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_yaml::from_reader(reader)?)
}

/// Human readable part of a checksummed bech32 address, lowercased.
pub fn bech32_prefix(address: &str) -> Result<String> {
    let (hrp, _) = bech32::decode(address)?;
    Ok(hrp.to_string().to_lowercase())
}

/// Integer part of an `sdk.Dec` string such as `"1523.000000000000000000"`.
pub fn parse_dec_amount(st: &str) -> Result<u128> {
    let integer = st.split_once('.').map_or(st, |(integer, _)| integer);
    if integer.is_empty() {
        return Ok(0);
    }
    Ok(integer.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dec_amount_is_floored() {
        assert_eq!(parse_dec_amount("1523.999999999999999999").unwrap(), 1523);
        assert_eq!(parse_dec_amount("42").unwrap(), 42);
        assert_eq!(parse_dec_amount(".5").unwrap(), 0);
        assert!(parse_dec_amount("abc.1").is_err());
    }

    #[test]
    fn bech32_prefix_is_read_from_checksummed_address() {
        use bech32::{Bech32, Hrp};

        let address =
            bech32::encode::<Bech32>(Hrp::parse("osmovaloper").unwrap(), &[7u8; 20]).unwrap();
        assert_eq!(bech32_prefix(&address).unwrap(), "osmovaloper");
        assert_eq!(bech32_prefix(&address.to_uppercase()).unwrap(), "osmovaloper");
        assert!(bech32_prefix("osmo1notanaddress").is_err());
    }
}
