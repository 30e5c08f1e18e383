pub mod Translator;

pub use Translator::{SeekTarget, SeekTranslator};
