use std::time::{SystemTime, UNIX_EPOCH};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const CALL_ID_SUFFIX_LEN: usize = 9;

#[inline]
pub(crate) fn unix_now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis())
}

/// Fresh tool-call id of the form `{name}-{unix_millis}-{random}`.
pub(crate) fn generate_call_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 16 + CALL_ID_SUFFIX_LEN);
    out.push_str(name);
    out.push('-');
    out.push_str(&unix_now_millis().to_string());
    out.push('-');
    for _ in 0..CALL_ID_SUFFIX_LEN {
        out.push(BASE36[fastrand::usize(..BASE36.len())] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_call_id_shape() {
        let id = generate_call_id("read_file");
        let mut pieces = id.rsplitn(3, '-');
        let suffix = pieces.next().expect("suffix");
        let millis = pieces.next().expect("millis");
        let name = pieces.next().expect("name");
        assert_eq!(name, "read_file");
        assert!(millis.parse::<u128>().is_ok());
        assert_eq!(suffix.len(), CALL_ID_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_call_id_is_unique() {
        assert_ne!(generate_call_id("x"), generate_call_id("x"));
    }
}
