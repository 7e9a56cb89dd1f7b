use routemap::extractors::django::DjangoExtractor;
use routemap::extractors::EndpointExtractor;
use routemap::model::{ParamDataType, ParamType};
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn urlconf_includes_resolve_and_views_yield_params() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "project/settings.py", "DEBUG = True\n");
    write(
        dir.path(),
        "project/urls.py",
        r#"from django.urls import path, include

urlpatterns = [
    path('blog/', include('blog.urls')),
]
"#,
    );
    write(
        dir.path(),
        "blog/urls.py",
        r#"from django.urls import path
from blog import views

urlpatterns = [
    path('posts/<int:pk>/', views.detail),
    path('search/', views.search),
]
"#,
    );
    write(
        dir.path(),
        "blog/views.py",
        r#"def detail(request, pk):
    return render(request, 'detail.html')

def search(request):
    q = request.GET['q']
    if request.method == 'POST':
        body = request.POST['body']
    return render(request, 'search.html')
"#,
    );

    let endpoints = DjangoExtractor.extract(dir.path());

    let detail = endpoints
        .iter()
        .find(|e| e.url_path == "blog/posts/{pk}/")
        .unwrap();
    assert_eq!(detail.file_path, "blog/views.py");
    let pk = &detail.parameters["pk"];
    assert_eq!(pk.param_type, ParamType::PathVariable);
    assert_eq!(pk.data_type, ParamDataType::Integer);

    let search = endpoints
        .iter()
        .find(|e| e.url_path == "blog/search/")
        .unwrap();
    assert!(search.has_parameter("q"));
    assert_eq!(search.variants.len(), 1);
    let post = &search.variants[0];
    assert_eq!(post.http_method, "POST");
    assert!(post.has_parameter("body"));
}

#[test]
fn mutual_includes_terminate() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a/settings.py", "");
    write(
        dir.path(),
        "a/urls.py",
        "from django.urls import path, include\nurlpatterns = [path('b/', include('b.urls'))]\n",
    );
    write(
        dir.path(),
        "b/urls.py",
        "from django.urls import path, include\nurlpatterns = [path('a/', include('a.urls'))]\n",
    );

    // must not recurse forever
    let endpoints = DjangoExtractor.extract(dir.path());
    assert!(endpoints.is_empty());
}

#[test]
fn empty_tree_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(DjangoExtractor.extract(dir.path()).is_empty());
}
