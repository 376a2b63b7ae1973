/// Load an Android shared library into memory
/// # Example
/// ```no_run
/// # use bionic_loader::load_library;
/// // with the default mmap backend
/// let lib = load_library!("fixtures/libguest.so");
/// // with a custom mmap backend
/// # type MyMmap = bionic_loader::mmap::MmapImpl;
/// let lib = load_library!("fixtures/libguest.so", mmap: MyMmap);
/// ```
#[macro_export]
macro_rules! load_library {
    ($path:expr) => {
        $crate::ElfLibrary::from_file($path)
    };
    ($path:expr, mmap: $mmap:ty) => {
        $crate::Loader::<$mmap>::new().load($path)
    };
}
