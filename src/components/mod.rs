//! UIコンポーネントモジュール

pub mod stamp_panel;
pub mod tire_inputs;
pub mod toast;

pub use stamp_panel::StampPanel;
pub use tire_inputs::TireRow;
pub use toast::Toast;
