use crate::error;

pub type Result<T> = ::std::result::Result<T, error::Error>;

#[macro_export]
macro_rules! io_err {
    ($kind:ident, $msg:expr) => {
        ::std::io::Error::new(::std::io::ErrorKind::$kind, $msg)
    };
}

#[macro_export]
macro_rules! res {
    ($err:expr) => {
        Err(From::from($err))
    };
}

/// Round `size` up to the next multiple of `align`.
pub fn round_up(size: u64, align: u64) -> u64 {
    let down = (size / align) * align;
    if down == size { down } else { down + align }
}

/// Format a byte count with a binary unit suffix, e.g. `1.5M`.
pub fn human_bytes(b: u64) -> String {
    const UNIT: u64 = 1024;
    if b < UNIT {
        return b.to_string();
    }
    let (mut div, mut exp) = (UNIT, 0);
    let mut n = b / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1}{}", b as f64 / div as f64, "KMGTPE".as_bytes()[exp] as char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_to_block() {
        assert_eq!(round_up(0, 4096), 0);
        assert_eq!(round_up(1, 4096), 4096);
        assert_eq!(round_up(4096, 4096), 4096);
        assert_eq!(round_up(4097, 4096), 8192);
        assert_eq!(round_up(29 + 5, 8), 40);
    }

    #[test]
    fn human_units() {
        assert_eq!(human_bytes(1023), "1023");
        assert_eq!(human_bytes(1024), "1.0K");
        assert_eq!(human_bytes(1536 * 1024), "1.5M");
        assert_eq!(human_bytes(10 * 1024 * 1024 * 1024), "10.0G");
    }
}
