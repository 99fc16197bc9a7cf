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

/// Split a `proto!host!port` address.
///
/// The port may be omitted, in which case `None` is returned for it.
pub fn parse_proto(arg: &str) -> Option<(&str, &str, Option<&str>)> {
    let mut split = arg.split('!');
    let (proto, addr) = (split.next()?, split.next()?);
    let port = split.next();
    if split.next().is_some() || addr.is_empty() {
        return None;
    }

    Some((proto, addr, port))
}

/// Round `n` up to the next multiple of four.
pub(crate) fn align4(n: usize) -> usize {
    (n + 3) & !3
}
