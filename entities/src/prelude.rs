pub use super::author::Entity as Author;
pub use super::book::Entity as Book;
pub use super::book_author::Entity as BookAuthor;
pub use super::book_collection::Entity as BookCollection;
pub use super::book_dimensions::Entity as BookDimensions;
pub use super::book_external_id::Entity as BookExternalId;
pub use super::book_image_link::Entity as BookImageLink;
pub use super::book_raw_data::Entity as BookRawData;
pub use super::book_recommendation::Entity as BookRecommendation;
pub use super::collection::Entity as Collection;
