#[inline]
pub fn arr_to_hex(data: &[u8]) -> String {
    let mut hex = String::with_capacity(data.len() * 2);
    for b in data {
        hex.push_str(&format!("{:02x}", b));
    }
    hex
}
