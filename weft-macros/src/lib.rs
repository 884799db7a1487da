//! Procedural macros for Weft.

use proc_macro::TokenStream;

mod behavior;

/// Register a function as a behavior in the global registry.
///
/// The function must have the behavior signature
/// `fn(&Conf, Option<Value>) -> Result<Capability, BoxError>`.
///
/// Without arguments the behavior is registered as
/// `<module path>/<function name>`; an explicit `"namespace/symbol"` name can
/// be given instead.
///
/// # Example
///
/// ```rust,ignore
/// #[weft::behavior("jobs/word-count")]
/// fn word_count(conf: &Conf, options: Option<Value>) -> Result<Capability, BoxError> {
///     Ok(Capability::task(WordCount::new(conf, options)?))
/// }
///
/// let registry = BehaviorRegistry::global();
/// ```
#[proc_macro_attribute]
pub fn behavior(attr: TokenStream, item: TokenStream) -> TokenStream {
    behavior::expand(attr, item)
}
