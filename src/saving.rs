use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;

use crate::response::Response;

/// Write the submission set to a compressed snapshot file.
///
/// The snapshot keeps the in-memory store alive across restarts; it is not
/// a database and holds no more than a gzip-compressed bincode dump.
///
/// # Arguments
/// * `responses` - The records to persist
/// * `filename` - Target path for the snapshot
///
/// # Returns
/// * `std::io::Result<()>` - Success or an IO error
pub fn save_responses(responses: &[Response], filename: &str) -> std::io::Result<()> {
    let file = File::create(filename)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, responses)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(())
}

/// Load a submission set from a snapshot file written by [`save_responses`].
///
/// # Arguments
/// * `filename` - Path of the snapshot to read
///
/// # Returns
/// * `std::io::Result<Vec<Response>>` - The records or an IO error
pub fn load_responses(filename: &str) -> std::io::Result<Vec<Response>> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let responses: Vec<Response> = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{Answers, Identity, Intention, Response};

    fn sample_record() -> Response {
        let answers = Answers {
            identity: Some(Identity::Potential),
            email: "owner@shop.tw".to_string(),
            business_name: "好味小館".to_string(),
            privacy_consent: "yes".to_string(),
            intention: Some(Intention::MoreInfo),
            contact_name: "王小明".to_string(),
            contact_phone: "0912345678".to_string(),
            tax_id: "12345678".to_string(),
            info_source: vec!["Google 搜尋".to_string(), "其他".to_string()],
            ..Answers::default()
        };
        Response::from_answers(&answers).unwrap()
    }

    #[test]
    fn snapshot_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.bin.gz");
        let path = path.to_str().unwrap();

        let records = vec![sample_record(), sample_record()];
        save_responses(&records, path).unwrap();

        let loaded = load_responses(path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn loading_a_missing_snapshot_fails() {
        assert!(load_responses("/nonexistent/responses.bin.gz").is_err());
    }
}
