/// Parses a CSS selector once and hands out a `&'static Selector`.
///
/// The literal is checked on first use, so a typo panics in tests rather than
/// in a user's chat.
#[macro_export]
macro_rules! selector {
    ($e: literal) => {{
        use ::once_cell::sync::Lazy;
        use ::scraper::Selector;
        static SELECTOR: Lazy<Selector> =
            Lazy::new(|| Selector::parse($e).expect(concat!("invalid selector: ", $e)));
        &*SELECTOR
    }};
}
