mod bytes;
mod mapper;
mod pe;
mod section;

pub(crate) use bytes::{read_u16, read_u32};
pub use mapper::MappedImage;
pub use pe::{DataDirectory, IMAGE_DIRECTORY_ENTRY_DEBUG, IMAGE_DIRECTORY_ENTRY_RESOURCE, PeImage};
pub use section::{
    SECTION_NAME_LEN, SectionDescriptor, find_section_by_name, translate_virtual_address,
};
