// `Marshaller<T>` is the trait `BincodeMarshaller` implements; it is not a
// type parameter of `Task`, so this demo exercises a from-scratch impl
// directly rather than plugging it into a running `Task`. A custom
// marshaller is useful on its own wherever a crate wants a stable wire
// format independent of `Task`'s internal bincode use.
use fiberpool::{Marshaller, RuntimeError};

struct CsvMarshaller;

impl Marshaller<Vec<i64>> for CsvMarshaller {
    fn encode(value: &Vec<i64>) -> Result<Vec<u8>, RuntimeError> {
        let text = value
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Ok(text.into_bytes())
    }

    fn decode(bytes: &[u8]) -> Result<Vec<i64>, RuntimeError> {
        let text = String::from_utf8_lossy(bytes);
        text.split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<i64>())
            .collect::<Result<Vec<i64>, _>>()
            .map_err(|err| RuntimeError::Marshal(err.to_string()))
    }
}

fn main() {
    let numbers = vec![1, 2, 3, 5, 8, 13];
    let encoded = CsvMarshaller::encode(&numbers).unwrap();
    println!("wire form: {}", String::from_utf8_lossy(&encoded));

    let decoded = CsvMarshaller::decode(&encoded).unwrap();
    assert_eq!(decoded, numbers);
    println!("round trip ok: {decoded:?}");
}
