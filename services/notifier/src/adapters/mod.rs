pub mod db;
pub mod mailer;
pub mod render_llm;
pub mod template;

pub use db::SqliteRowStore;
pub use mailer::SmtpMailTransport;
pub use render_llm::OpenAiRenderer;
pub use template::TemplateRenderer;
