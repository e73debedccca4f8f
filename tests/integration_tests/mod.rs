pub mod common;
mod iso_images;
mod udf_images;
