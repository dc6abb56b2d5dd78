// Reversible, salted short URLs for game-set ids.

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MIN_LENGTH: usize = 6;

/// Encodes non-negative ids as base62 over an alphabet permuted by a salt.
///
/// The permutation is deterministic for a given salt, so URLs stay stable
/// across restarts as long as the salt does. Output is left-padded with the
/// zero digit to at least six characters.
#[derive(Clone, Debug)]
pub struct ShortUrlCodec {
    alphabet: Vec<u8>,
}

impl ShortUrlCodec {
    pub fn new(salt: &str) -> Self {
        let mut alphabet = ALPHABET.to_vec();
        shuffle(&mut alphabet, salt.as_bytes());
        Self { alphabet }
    }

    pub fn encode(&self, id: i64) -> String {
        let base = self.alphabet.len() as u64;
        let mut value = id.max(0) as u64;
        let mut digits = Vec::new();
        loop {
            digits.push(self.alphabet[(value % base) as usize]);
            value /= base;
            if value == 0 {
                break;
            }
        }
        while digits.len() < MIN_LENGTH {
            digits.push(self.alphabet[0]);
        }
        digits.reverse();
        // Alphabet is ASCII.
        String::from_utf8(digits).unwrap_or_default()
    }

    pub fn decode(&self, short_url: &str) -> Option<i64> {
        if short_url.is_empty() {
            return None;
        }
        let base = self.alphabet.len() as u64;
        let mut value: u64 = 0;
        for byte in short_url.bytes() {
            let digit = self.alphabet.iter().position(|&c| c == byte)? as u64;
            value = value.checked_mul(base)?.checked_add(digit)?;
        }
        i64::try_from(value).ok()
    }
}

fn shuffle(alphabet: &mut [u8], salt: &[u8]) {
    if salt.is_empty() {
        return;
    }
    let mut v = 0usize;
    let mut p = 0usize;
    for i in (1..alphabet.len()).rev() {
        v %= salt.len();
        let n = salt[v] as usize;
        p += n;
        let j = (n + v + p) % i;
        alphabet.swap(i, j);
        v += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_id_is_encoded_then_it_decodes_back() {
        let codec = ShortUrlCodec::new("secret");
        for id in [0, 1, 61, 62, 4_096, 987_654_321, i64::MAX] {
            let short = codec.encode(id);
            assert!(short.len() >= MIN_LENGTH);
            assert_eq!(codec.decode(&short), Some(id), "id {id} via {short}");
        }
    }

    #[test]
    fn when_salts_differ_then_urls_differ() {
        let a = ShortUrlCodec::new("alpha");
        let b = ShortUrlCodec::new("bravo");
        assert_ne!(a.encode(42), b.encode(42));
    }

    #[test]
    fn when_short_url_has_foreign_characters_then_decode_fails() {
        let codec = ShortUrlCodec::new("secret");
        assert_eq!(codec.decode("abc-def"), None);
        assert_eq!(codec.decode(""), None);
    }

    #[test]
    fn when_short_url_overflows_then_decode_fails() {
        let codec = ShortUrlCodec::new("secret");
        let huge: String = std::iter::repeat(codec.alphabet[61] as char).take(20).collect();
        assert_eq!(codec.decode(&huge), None);
    }
}
