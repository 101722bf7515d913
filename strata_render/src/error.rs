use snafu::Snafu;

pub type Result<T, E = GpuError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum GpuError {
    #[snafu(display("Couldn't find a GPU adapter that supports compute passes"))]
    NoAdapter,

    #[snafu(display("Unable to get device: {message}"))]
    RequestDevice { message: String },

    #[snafu(display("Unable to create rendering context: {message}"))]
    ContextCreation { message: String },
}
