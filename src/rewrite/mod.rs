pub mod css;
pub mod filter;
pub mod html;
pub mod js;
