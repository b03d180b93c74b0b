//! ビューモジュール（入力画面・結果画面）

pub mod entry_form;
pub mod result_view;

pub use entry_form::EntryForm;
pub use result_view::ResultView;
