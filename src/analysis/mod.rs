/// Statistical transforms over the loaded table.
pub mod pca;
